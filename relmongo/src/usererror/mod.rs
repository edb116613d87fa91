//! Stable numeric codes and user-facing messages for every error the crate
//! reports. Codes are grouped by the module raising the error: 1xxx document
//! maps, 2xxx query translation, 3xxx write translation, 4xxx value
//! conversion, 5xxx the store.

use crate::{document_map, marshal, store, translator, write};

pub trait UserError {
    fn code(&self) -> u32;
    fn user_message(&self) -> Option<String>;
    fn technical_message(&self) -> String;
}

/// Renders an error the way clients display it, with the user message first
/// when there is one.
pub fn display<E: UserError + ?Sized>(error: &E) -> String {
    let message = match error.user_message() {
        Some(user_message) => format!(
            "{user_message}\n\tCaused by:\n\t{}",
            error.technical_message()
        ),
        None => error.technical_message(),
    };
    format!("Error {}: {message}", error.code())
}

impl UserError for document_map::Error {
    fn code(&self) -> u32 {
        use document_map::Error::*;
        match self {
            UnknownTable(_) => 1001,
            UnknownColumn { .. } => 1002,
            MergedAndEmbeddable(_) => 1003,
            KeyColumnMismatch { .. } => 1004,
            MissingMergeKey { .. } => 1005,
            AmbiguousMergeKey { .. } => 1006,
            Cyclic(_) => 1007,
            EmbedCopyConflict(_, _) => 1008,
            AmbiguousReachability { .. } => 1009,
        }
    }

    fn user_message(&self) -> Option<String> {
        use document_map::Error::*;
        match self {
            MergedAndEmbeddable(table) => Some(format!(
                "Remove either the merge or the embeddable property of table `{table}`."
            )),
            MissingMergeKey { table, parent } => Some(format!(
                "Add a foreign key from `{table}` to `{parent}`, or remove its merge property."
            )),
            _ => None,
        }
    }

    fn technical_message(&self) -> String {
        self.to_string()
    }
}

impl UserError for translator::Error {
    fn code(&self) -> u32 {
        use translator::Error::*;
        match self {
            Unsupported(_) => 2001,
            UnsupportedFunction(_) => 2002,
            FunctionArity(_, _) => 2003,
            UnknownSource(_) => 2004,
            DuplicateSource(_) => 2005,
            UnknownColumn(_) => 2006,
            AmbiguousColumn(_) => 2007,
            NotColocated(_) => 2008,
            ColumnNotGrouped(_) => 2009,
            AggregateNotAllowed(_) => 2010,
            OrderByNotProjected(_) => 2011,
            NotElementLocal(_) => 2012,
            LimitOutOfI64Range(_) => 2013,
            OffsetOutOfI64Range(_) => 2014,
            DocumentMap(e) => e.code(),
            Marshal(e) => e.code(),
        }
    }

    fn user_message(&self) -> Option<String> {
        use translator::Error::*;
        match self {
            NotColocated(_) => Some(
                "Only tables stored in the same document can be joined. Query them separately."
                    .to_string(),
            ),
            AmbiguousColumn(column) => Some(format!(
                "Qualify `{column}` with the table or alias it belongs to."
            )),
            DocumentMap(e) => e.user_message(),
            Marshal(e) => e.user_message(),
            _ => None,
        }
    }

    fn technical_message(&self) -> String {
        self.to_string()
    }
}

impl UserError for write::Error {
    fn code(&self) -> u32 {
        use write::Error::*;
        match self {
            Unsupported(_) => 3001,
            UnknownColumn { .. } => 3002,
            ColumnCount { .. } => 3003,
            MissingKey(_) => 3004,
            MissingParentKey(_) => 3005,
            PrimaryKeyUpdate(_) => 3006,
            NonLiteralValue(_) => 3007,
            Evaluation(_) => 3008,
            Translator(e) => e.code(),
            DocumentMap(e) => e.code(),
            Marshal(e) => e.code(),
            Store(e) => e.code(),
        }
    }

    fn user_message(&self) -> Option<String> {
        use write::Error::*;
        match self {
            MissingParentKey(table) => Some(format!(
                "Rows of `{table}` are stored inside their parent row. Supply its key."
            )),
            PrimaryKeyUpdate(_) => {
                Some("Delete the row and insert it again with the new key.".to_string())
            }
            Translator(e) => e.user_message(),
            DocumentMap(e) => e.user_message(),
            Marshal(e) => e.user_message(),
            Store(e) => e.user_message(),
            _ => None,
        }
    }

    fn technical_message(&self) -> String {
        self.to_string()
    }
}

impl UserError for marshal::Error {
    fn code(&self) -> u32 {
        use marshal::Error::*;
        match self {
            Conversion { .. } => 4001,
            InvalidDecimal(_) => 4002,
            InvalidText => 4003,
            DateOutOfRange(_) => 4004,
            KeyShape { .. } => 4005,
            LargeObject(e) => e.code(),
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            marshal::Error::LargeObject(e) => e.user_message(),
            _ => None,
        }
    }

    fn technical_message(&self) -> String {
        self.to_string()
    }
}

impl UserError for store::Error {
    fn code(&self) -> u32 {
        use store::Error::*;
        match self {
            Driver(_) => 5001,
            LargeObjectNotFound(_) => 5002,
            MalformedLargeObject(_) => 5003,
            LargeObjectsUnavailable => 5004,
        }
    }

    fn user_message(&self) -> Option<String> {
        match self {
            store::Error::LargeObjectsUnavailable => Some(
                "Large object values need a connection to the store, even for translation."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn technical_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod test;
