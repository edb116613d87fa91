use super::{ColumnDetail, ColumnRegistry};
use bson::{bson, Bson};

#[test]
fn stored_fields_are_recognized() {
    let detail = ColumnDetail::new(Bson::String("$orders.amount".to_string()));
    assert_eq!(Some("orders.amount"), detail.field_path.as_deref());
    let computed = ColumnDetail::new(bson!({"$toUpper": ["$name"]}));
    assert_eq!(None, computed.field_path);
    let variable = ColumnDetail::new(Bson::String("$$ROOT".to_string()));
    assert_eq!(None, variable.field_path);
}

#[test]
fn register_keeps_the_first_entry() {
    let mut registry = ColumnRegistry::new();
    registry.register("c.name", ColumnDetail::new(Bson::String("$name".to_string())));
    registry.register("c.name", ColumnDetail::new(Bson::String("$other".to_string())));
    assert_eq!(
        Bson::String("$name".to_string()),
        registry.get("c.name").unwrap().expression
    );
}

#[test]
fn aliases_accumulate_and_match_case_insensitively() {
    let mut registry = ColumnRegistry::new();
    registry.register("c.name", ColumnDetail::new(Bson::String("$name".to_string())));
    assert!(registry.add_alias("c.name", "name"));
    assert!(registry.add_alias("c.name", "customer_name"));
    assert!(registry.add_alias("c.name", "NAME"));
    assert!(!registry.add_alias("c.id", "id"));

    let detail = registry.get("c.name").unwrap();
    assert_eq!(vec!["name", "customer_name"], detail.aliases);
    assert!(detail.has_alias("Customer_Name"));
}

#[test]
fn iteration_follows_insertion_order() {
    let mut registry = ColumnRegistry::new();
    for (fp, path) in [("b", "$b"), ("a", "$a"), ("c", "$c")] {
        registry.register(fp, ColumnDetail::new(Bson::String(path.to_string())));
    }
    assert_eq!(vec!["b", "a", "c"], registry.field_paths().collect::<Vec<_>>());
}
