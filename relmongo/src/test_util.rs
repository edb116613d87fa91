use crate::{
    catalog::{Catalog, Column, ForeignKey, Table},
    types::RelationalType as T,
};

/// customer (root) holding merged orders (many) with merged lineitems (many),
/// a merged profile (one), and embedded copies of state and product.
pub(crate) fn catalog() -> Catalog {
    vec![
        Table::new("customer")
            .column(Column::new("id", T::Integer).auto_generated())
            .column(Column::new("name", T::String))
            .column(Column::new("state_code", T::String))
            .column(Column::new("joined", T::Date))
            .primary_key(["id"])
            .foreign_key(ForeignKey::new("fk_customer_state", ["state_code"], "state")),
        Table::new("state")
            .column(Column::new("code", T::String))
            .column(Column::new("name", T::String))
            .primary_key(["code"])
            .embeddable(),
        Table::new("orders")
            .column(Column::new("id", T::Integer))
            .column(Column::new("customer_id", T::Integer))
            .column(Column::new("amount", T::Double))
            .column(Column::new("status", T::String))
            .column(Column::new("product_id", T::Integer))
            .primary_key(["id"])
            .foreign_key(ForeignKey::new("fk_orders_customer", ["customer_id"], "customer"))
            .foreign_key(ForeignKey::new("fk_orders_product", ["product_id"], "product"))
            .merge_into("customer"),
        Table::new("lineitem")
            .column(Column::new("order_id", T::Integer))
            .column(Column::new("line_no", T::Integer))
            .column(Column::new("qty", T::Integer))
            .column(Column::new("sku", T::String))
            .primary_key(["order_id", "line_no"])
            .foreign_key(ForeignKey::new("fk_lineitem_orders", ["order_id"], "orders"))
            .merge_into("orders"),
        Table::new("profile")
            .column(Column::new("customer_id", T::Integer))
            .column(Column::new("bio", T::String))
            .primary_key(["customer_id"])
            .foreign_key(ForeignKey::new("fk_profile_customer", ["customer_id"], "customer"))
            .merge_into("customer"),
        Table::new("product")
            .column(Column::new("id", T::Integer))
            .column(Column::new("name", T::String))
            .column(Column::new("price", T::Double))
            .primary_key(["id"])
            .embeddable(),
        Table::new("notes")
            .column(Column::new("id", T::Integer).auto_generated())
            .column(Column::new("body", T::Clob))
            .primary_key(["id"]),
    ]
    .into_iter()
    .collect()
}
