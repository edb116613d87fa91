use crate::{
    decode::{decode_row, get_path},
    marshal::Marshaller,
    store::recording::RecordingStore,
    translator::OutputColumn,
    types::{RelationalType, Value},
};
use bson::{doc, Bson};

fn column(name: &str, path: &str, ty: RelationalType) -> OutputColumn {
    OutputColumn {
        name: name.to_string(),
        path: path.to_string(),
        ty,
    }
}

#[test]
fn get_path_walks_documents_and_arrays() {
    let d = doc! { "_id": { "state": "WA" }, "orders": [{ "amount": 1.5 }, { "amount": 2.5 }] };
    assert_eq!(Some(&Bson::String("WA".to_string())), get_path(&d, "_id.state"));
    assert_eq!(Some(&Bson::Double(2.5)), get_path(&d, "orders.1.amount"));
    assert_eq!(None, get_path(&d, "orders.2.amount"));
    assert_eq!(None, get_path(&d, "_id.state.x"));
}

#[test]
fn missing_fields_decode_as_null() {
    let store = RecordingStore::new();
    let marshaller = Marshaller::new(&store);
    let columns = vec![
        column("name", "name", RelationalType::String),
        column("total", "total", RelationalType::Long),
        column("code", "_id.code", RelationalType::String),
    ];
    let row = decode_row(
        &columns,
        &doc! { "name": "Ada", "total": 3, "_id": { "code": "WA" } },
        &marshaller,
    )
    .unwrap();
    assert_eq!(
        vec![
            Value::String("Ada".to_string()),
            Value::Long(3),
            Value::String("WA".to_string())
        ],
        row
    );

    let row = decode_row(&columns, &doc! { "name": null }, &marshaller).unwrap();
    assert_eq!(vec![Value::Null, Value::Null, Value::Null], row);
}
