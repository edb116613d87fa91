use super::{display, UserError};
use crate::{document_map, marshal, result::Error, store, translator, write};

mod code {
    use super::*;

    #[test]
    fn module_errors_keep_their_range() {
        assert_eq!(1001, document_map::Error::UnknownTable("t".to_string()).code());
        assert_eq!(2008, translator::Error::NotColocated(vec![]).code());
        assert_eq!(3006, write::Error::PrimaryKeyUpdate("id".to_string()).code());
        assert_eq!(4003, marshal::Error::InvalidText.code());
        assert_eq!(5001, store::Error::Driver("down".to_string()).code());
    }

    #[test]
    fn wrapped_errors_report_the_inner_code() {
        let inner = document_map::Error::Cyclic("a".to_string());
        assert_eq!(
            1007,
            translator::Error::DocumentMap(inner.clone()).code()
        );
        assert_eq!(
            1007,
            write::Error::Translator(translator::Error::DocumentMap(inner.clone())).code()
        );
        assert_eq!(1007, Error::from(inner).code());
    }

    #[test]
    fn large_object_failures_surface_as_store_errors() {
        let e = marshal::Error::LargeObject(store::Error::LargeObjectsUnavailable);
        assert_eq!(5004, e.code());
        assert!(e.user_message().is_some());
    }
}

mod message {
    use super::*;

    #[test]
    fn technical_message_is_the_error_text() {
        let e = translator::Error::UnknownSource("o".to_string());
        assert_eq!("unknown table or alias 'o'", e.technical_message());
        assert_eq!(None, e.user_message());
    }

    #[test]
    fn display_without_user_message() {
        assert_eq!(
            "Error 2004: unknown table or alias 'o'",
            display(&translator::Error::UnknownSource("o".to_string()))
        );
    }

    #[test]
    fn display_with_user_message() {
        assert_eq!(
            "Error 2007: Qualify `id` with the table or alias it belongs to.\n\tCaused by:\n\tcolumn 'id' is ambiguous",
            display(&translator::Error::AmbiguousColumn("id".to_string()))
        );
    }
}
