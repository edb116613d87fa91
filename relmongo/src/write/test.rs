use crate::{
    ast::{Assignment, Command, ComparisonOp, Delete, Expression, Insert, Update},
    types::Value,
};

macro_rules! test_translate_write {
    ($func_name:ident, expected = Ok($expected:expr), input = $input:expr,) => {
        #[test]
        fn $func_name() {
            use crate::{
                options::TranslatorOptions, store::NoLargeObjects, test_util::catalog,
                write::translate_write,
            };
            let plan = translate_write(
                &$input,
                &catalog(),
                &TranslatorOptions::default(),
                &NoLargeObjects,
            )
            .expect("translation failed");
            assert_eq!($expected, plan);
        }
    };

    ($func_name:ident, expected = Err($expected_err:expr), input = $input:expr,) => {
        #[test]
        fn $func_name() {
            use crate::{
                options::TranslatorOptions, store::NoLargeObjects, test_util::catalog,
                write::translate_write,
            };
            let actual = translate_write(
                &$input,
                &catalog(),
                &TranslatorOptions::default(),
                &NoLargeObjects,
            );
            assert_eq!(Err($expected_err), actual);
        }
    };
}

/// Translates and executes `command` against `store`.
fn run(
    command: Command,
    store: &crate::store::recording::RecordingStore,
) -> crate::write::WriteOutcome {
    use crate::{
        options::TranslatorOptions,
        test_util::catalog,
        write::{execute_write, translate_write},
    };
    let plan = translate_write(&command, &catalog(), &TranslatorOptions::default(), store)
        .expect("translation failed");
    execute_write(&plan, store).expect("execution failed")
}

fn col(table: &str, column: &str) -> Expression {
    Expression::column(table, column)
}

fn int(i: i32) -> Expression {
    Expression::literal(Value::Integer(i))
}

fn double(d: f64) -> Expression {
    Expression::literal(Value::Double(d))
}

fn string(s: &str) -> Expression {
    Expression::literal(Value::String(s.to_string()))
}

fn eq(left: Expression, right: Expression) -> Expression {
    Expression::compare(ComparisonOp::Eq, left, right)
}

fn insert(table: &str, columns: &[&str], rows: Vec<Vec<Expression>>) -> Command {
    Command::Insert(Insert {
        table: table.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows,
    })
}

fn update(table: &str, assignments: Vec<(&str, Expression)>, filter: Option<Expression>) -> Command {
    Command::Update(Update {
        table: table.to_string(),
        assignments: assignments
            .into_iter()
            .map(|(column, value)| Assignment {
                column: column.to_string(),
                value,
            })
            .collect(),
        filter,
    })
}

fn delete(table: &str, filter: Option<Expression>) -> Command {
    Command::Delete(Delete {
        table: table.to_string(),
        filter,
    })
}

mod insert {
    use super::*;
    use crate::{
        store::recording::{Call, RecordingStore},
        types::RelationalType,
        write::{CopyFetch, Error, InsertPlan, InsertRow, InsertTarget, WritePlan},
    };
    use bson::doc;

    test_translate_write!(
        merged_row_is_pushed_into_its_parent,
        expected = Ok(WritePlan::Insert(InsertPlan {
            table: "orders".to_string(),
            rows: vec![InsertRow {
                target: InsertTarget::Parent {
                    collection: "customer".to_string(),
                    filter: doc! { "_id": 1 },
                    path: "orders".to_string(),
                    array_filters: vec![],
                    many: true,
                },
                row: doc! { "_id": 7, "amount": 9.5, "status": "open", "product_id": 3 },
                copies: vec![CopyFetch {
                    field: "product".to_string(),
                    source: Some(("product".to_string(), doc! { "_id": 3 })),
                }],
            }],
            generated_key: None,
        })),
        input = insert(
            "orders",
            &["id", "customer_id", "amount", "status", "product_id"],
            vec![vec![int(7), int(1), double(9.5), string("open"), int(3)]],
        ),
    );

    test_translate_write!(
        nested_merged_row_binds_the_enclosing_array,
        expected = Ok(WritePlan::Insert(InsertPlan {
            table: "lineitem".to_string(),
            rows: vec![InsertRow {
                target: InsertTarget::Parent {
                    collection: "customer".to_string(),
                    filter: doc! { "orders._id": 7 },
                    path: "orders.$[a0].lineitem".to_string(),
                    array_filters: vec![doc! { "a0._id": 7 }],
                    many: true,
                },
                row: doc! { "_id": 2, "qty": 5, "sku": "A-1" },
                copies: vec![],
            }],
            generated_key: None,
        })),
        input = insert(
            "lineitem",
            &["order_id", "line_no", "qty", "sku"],
            vec![vec![int(7), int(2), int(5), string("A-1")]],
        ),
    );

    test_translate_write!(
        one_merge_sets_the_sub_document,
        expected = Ok(WritePlan::Insert(InsertPlan {
            table: "profile".to_string(),
            rows: vec![InsertRow {
                target: InsertTarget::Parent {
                    collection: "customer".to_string(),
                    filter: doc! { "_id": 1 },
                    path: "profile".to_string(),
                    array_filters: vec![],
                    many: false,
                },
                row: doc! { "bio": "hi" },
                copies: vec![],
            }],
            generated_key: None,
        })),
        input = insert("profile", &["customer_id", "bio"], vec![vec![int(1), string("hi")]]),
    );

    test_translate_write!(
        root_row_without_key_leaves_it_to_the_store,
        expected = Ok(WritePlan::Insert(InsertPlan {
            table: "customer".to_string(),
            rows: vec![InsertRow {
                target: InsertTarget::Collection("customer".to_string()),
                row: doc! { "name": "Ann", "state_code": "CA" },
                copies: vec![CopyFetch {
                    field: "state".to_string(),
                    source: Some(("state".to_string(), doc! { "_id": "CA" })),
                }],
            }],
            generated_key: Some(("id".to_string(), RelationalType::Integer)),
        })),
        input = insert("customer", &["name", "state_code"], vec![vec![string("Ann"), string("CA")]]),
    );

    test_translate_write!(
        null_values_are_not_stored,
        expected = Ok(WritePlan::Insert(InsertPlan {
            table: "customer".to_string(),
            rows: vec![InsertRow {
                target: InsertTarget::Collection("customer".to_string()),
                row: doc! { "_id": 4, "name": "Bo" },
                copies: vec![],
            }],
            generated_key: None,
        })),
        input = insert(
            "customer",
            &["id", "name", "state_code"],
            vec![vec![int(4), string("Bo"), Expression::literal(Value::Null)]],
        ),
    );

    test_translate_write!(
        merged_row_needs_its_parent_key,
        expected = Err(Error::MissingParentKey("orders".to_string())),
        input = insert("orders", &["id", "amount"], vec![vec![int(8), double(1.0)]]),
    );

    test_translate_write!(
        merged_row_needs_its_own_key,
        expected = Err(Error::MissingKey("orders".to_string())),
        input = insert("orders", &["customer_id", "amount"], vec![vec![int(1), double(1.0)]]),
    );

    test_translate_write!(
        row_length_must_match_the_column_list,
        expected = Err(Error::ColumnCount {
            expected: 1,
            actual: 2
        }),
        input = insert("customer", &["name"], vec![vec![string("a"), string("b")]]),
    );

    test_translate_write!(
        unknown_column,
        expected = Err(Error::UnknownColumn {
            table: "customer".to_string(),
            column: "nope".to_string()
        }),
        input = insert("customer", &["nope"], vec![vec![int(1)]]),
    );

    test_translate_write!(
        values_must_be_constants,
        expected = Err(Error::NonLiteralValue(crate::ast::PrettyPrint::pretty_print(
            &col("customer", "name")
        ))),
        input = insert("customer", &["name"], vec![vec![col("customer", "name")]]),
    );

    #[test]
    fn generated_key_and_copy_are_resolved_on_execution() {
        let store = RecordingStore::new()
            .with_find_one_result(Some(doc! { "_id": "CA", "name": "California" }));
        let outcome = run(
            insert("customer", &["name", "state_code"], vec![vec![string("Ann"), string("CA")]]),
            &store,
        );
        assert_eq!(
            vec![
                Call::FindOne {
                    collection: "state".to_string(),
                    filter: doc! { "_id": "CA" },
                },
                Call::Insert {
                    collection: "customer".to_string(),
                    document: doc! {
                        "name": "Ann",
                        "state_code": "CA",
                        "state": { "name": "California" },
                    },
                },
            ],
            store.calls()
        );
        assert_eq!(1, outcome.affected);
        assert_eq!(Some(Value::Integer(100)), outcome.generated_key);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn unconvertible_generated_key_is_a_warning() {
        let store = RecordingStore::new();
        store.generate_object_ids.set(true);
        let outcome = run(insert("customer", &["name"], vec![vec![string("Ann")]]), &store);
        assert_eq!(
            1,
            store
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::Insert { .. }))
                .count()
        );
        assert_eq!(1, outcome.affected);
        assert_eq!(None, outcome.generated_key);
        assert_eq!(1, outcome.warnings.len());
        assert!(outcome.warnings[0].starts_with("the key generated for 'customer'.'id'"));
    }

    #[test]
    fn merged_insert_updates_the_parent_document() {
        let store = RecordingStore::new()
            .with_find_one_result(Some(doc! { "_id": 3, "name": "Lamp", "price": 20.0 }));
        let outcome = run(
            insert(
                "orders",
                &["id", "customer_id", "amount", "product_id"],
                vec![vec![int(7), int(1), double(9.5), int(3)]],
            ),
            &store,
        );
        let updates = store.updates();
        assert_eq!(1, updates.len());
        assert_eq!("customer", updates[0].collection);
        assert_eq!(doc! { "_id": 1 }, updates[0].filter);
        assert_eq!(
            doc! { "$push": { "orders": {
                "_id": 7,
                "amount": 9.5,
                "product_id": 3,
                "product": { "name": "Lamp", "price": 20.0 },
            } } },
            updates[0].update
        );
        assert!(!updates[0].multi);
        assert!(!store
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Insert { .. })));
        assert_eq!(None, outcome.generated_key);
    }

    #[test]
    fn missing_referenced_row_leaves_the_copy_out() {
        let store = RecordingStore::new().with_find_one_result(None);
        let outcome = run(
            insert(
                "orders",
                &["id", "customer_id", "product_id"],
                vec![vec![int(7), int(1), int(99)]],
            ),
            &store,
        );
        assert_eq!(
            doc! { "$push": { "orders": { "_id": 7, "product_id": 99 } } },
            store.updates()[0].update
        );
        assert_eq!(1, outcome.warnings.len());
    }

    #[test]
    fn unmatched_parent_is_reported() {
        let store = RecordingStore::new();
        store.matched.set(0);
        let outcome = run(
            insert("profile", &["customer_id", "bio"], vec![vec![int(42), string("hi")]]),
            &store,
        );
        assert_eq!(0, outcome.affected);
        assert_eq!(1, outcome.warnings.len());
    }
}

mod delete {
    use super::*;
    use crate::{
        store::{recording::RecordingStore, AggregateRequest, UpdateRequest},
        write::{PullPlan, WritePlan},
    };
    use bson::doc;

    test_translate_write!(
        element_local_filter_pulls_from_the_array,
        expected = Ok(WritePlan::Pull(PullPlan {
            table: "orders".to_string(),
            count_query: AggregateRequest {
                collection: "customer".to_string(),
                pipeline: vec![
                    doc! { "$unwind": "$orders" },
                    doc! { "$match": { "orders.status": { "$eq": "void" } } },
                    doc! { "$count": "n" },
                ],
            },
            mutation: UpdateRequest::new(
                "customer",
                doc! { "orders": { "$elemMatch": { "status": { "$eq": "void" } } } },
                doc! { "$pull": { "orders": { "status": { "$eq": "void" } } } },
            ),
        })),
        input = delete("orders", Some(eq(col("orders", "status"), string("void")))),
    );

    test_translate_write!(
        nested_array_pull_spans_every_enclosing_array,
        expected = Ok(WritePlan::Pull(PullPlan {
            table: "lineitem".to_string(),
            count_query: AggregateRequest {
                collection: "customer".to_string(),
                pipeline: vec![
                    doc! { "$unwind": "$orders" },
                    doc! { "$unwind": "$orders.lineitem" },
                    doc! { "$match": { "orders.lineitem.qty": { "$eq": 0 } } },
                    doc! { "$count": "n" },
                ],
            },
            mutation: UpdateRequest::new(
                "customer",
                doc! { "orders.lineitem": { "$elemMatch": { "qty": { "$eq": 0 } } } },
                doc! { "$pull": { "orders.$[].lineitem": { "qty": { "$eq": 0 } } } },
            ),
        })),
        input = delete("lineitem", Some(eq(col("lineitem", "qty"), int(0)))),
    );

    test_translate_write!(
        unfiltered_pull_empties_every_array,
        expected = Ok(WritePlan::Pull(PullPlan {
            table: "orders".to_string(),
            count_query: AggregateRequest {
                collection: "customer".to_string(),
                pipeline: vec![doc! { "$unwind": "$orders" }, doc! { "$count": "n" }],
            },
            mutation: UpdateRequest::new(
                "customer",
                doc! { "orders": { "$exists": true } },
                doc! { "$pull": { "orders": {} } },
            ),
        })),
        input = delete("orders", None),
    );

    test_translate_write!(
        unfiltered_nested_pull_skips_documents_without_the_array,
        expected = Ok(WritePlan::Pull(PullPlan {
            table: "lineitem".to_string(),
            count_query: AggregateRequest {
                collection: "customer".to_string(),
                pipeline: vec![
                    doc! { "$unwind": "$orders" },
                    doc! { "$unwind": "$orders.lineitem" },
                    doc! { "$count": "n" },
                ],
            },
            mutation: UpdateRequest::new(
                "customer",
                doc! { "orders.lineitem": { "$exists": true } },
                doc! { "$pull": { "orders.$[].lineitem": {} } },
            ),
        })),
        input = delete("lineitem", None),
    );

    test_translate_write!(
        not_equal_pull_leaves_elements_without_the_value,
        expected = Ok(WritePlan::Pull(PullPlan {
            table: "lineitem".to_string(),
            count_query: AggregateRequest {
                collection: "customer".to_string(),
                pipeline: vec![
                    doc! { "$unwind": "$orders" },
                    doc! { "$unwind": "$orders.lineitem" },
                    doc! { "$match": { "orders.lineitem.qty": { "$nin": [5, null] } } },
                    doc! { "$count": "n" },
                ],
            },
            mutation: UpdateRequest::new(
                "customer",
                doc! { "orders.lineitem": { "$elemMatch": { "qty": { "$nin": [5, null] } } } },
                doc! { "$pull": { "orders.$[].lineitem": { "qty": { "$nin": [5, null] } } } },
            ),
        })),
        input = delete(
            "lineitem",
            Some(Expression::compare(ComparisonOp::Neq, col("lineitem", "qty"), int(5)))
        ),
    );

    #[test]
    fn pull_counts_before_removing() {
        let store = RecordingStore::new().with_aggregate_result(vec![doc! { "n": 2 }]);
        let outcome = run(
            delete("orders", Some(eq(col("orders", "status"), string("void")))),
            &store,
        );
        assert_eq!(2, outcome.affected);
        assert_eq!(1, store.updates().len());
    }

    #[test]
    fn pull_is_skipped_when_nothing_matches() {
        let store = RecordingStore::new().with_aggregate_result(vec![]);
        let outcome = run(
            delete("orders", Some(eq(col("orders", "status"), string("void")))),
            &store,
        );
        assert_eq!(0, outcome.affected);
        assert!(store.updates().is_empty());
    }

    #[test]
    fn parent_predicate_rewrites_the_array() {
        let store = RecordingStore::new().with_aggregate_result(vec![
            doc! { "_id": 1, "orders": [
                { "_id": 7, "status": "void", "amount": 1.0 },
                { "_id": 8, "status": "open" },
            ] },
            doc! { "_id": 2, "orders": [{ "_id": 9, "status": "void" }] },
        ]);
        let outcome = run(
            delete(
                "orders",
                Some(Expression::And(vec![
                    eq(col("orders", "customer_id"), int(1)),
                    eq(col("orders", "status"), string("void")),
                ])),
            ),
            &store,
        );
        assert_eq!(
            crate::store::recording::Call::Aggregate {
                collection: "customer".to_string(),
                pipeline: vec![
                    doc! { "$match": { "orders": { "$exists": true } } },
                    doc! { "$project": { "_id": 1, "orders": 1 } },
                ],
            },
            store.calls()[0]
        );
        assert_eq!(
            vec![UpdateRequest::new(
                "customer",
                doc! { "_id": 1 },
                doc! { "$set": { "orders": [{ "_id": 8, "status": "open" }] } },
            )
            .single()],
            store.updates()
        );
        assert_eq!(1, outcome.affected);
    }

    #[test]
    fn rewrite_keeps_rows_whose_comparison_is_unknown() {
        use crate::{
            options::TranslatorOptions,
            test_util::catalog,
            write::{execute_write, translate_write},
        };
        let store = RecordingStore::new().with_aggregate_result(vec![doc! {
            "_id": 1,
            "orders": [{ "_id": 7, "lineitem": [
                { "_id": 1, "qty": 5 },
                { "_id": 2 },
                { "_id": 3, "qty": 4 },
            ] }],
        }]);
        let options = TranslatorOptions {
            pull_fast_path: false,
            ..TranslatorOptions::default()
        };
        let plan = translate_write(
            &delete(
                "lineitem",
                Some(Expression::compare(ComparisonOp::Neq, col("lineitem", "qty"), int(5))),
            ),
            &catalog(),
            &options,
            &store,
        )
        .expect("translation failed");
        assert!(matches!(plan, WritePlan::Nested(_)));
        let outcome = execute_write(&plan, &store).expect("execution failed");
        assert_eq!(
            vec![UpdateRequest::new(
                "customer",
                doc! { "_id": 1 },
                doc! { "$set": { "orders.0.lineitem": [{ "_id": 1, "qty": 5 }, { "_id": 2 }] } },
            )
            .single()],
            store.updates()
        );
        assert_eq!(1, outcome.affected);
    }

    #[test]
    fn one_merge_is_unset() {
        let store = RecordingStore::new().with_aggregate_result(vec![
            doc! { "_id": 1, "profile": { "bio": "old" } },
            doc! { "_id": 2, "profile": { "bio": "new" } },
        ]);
        let outcome = run(
            delete("profile", Some(eq(col("profile", "bio"), string("old")))),
            &store,
        );
        assert_eq!(
            vec![
                UpdateRequest::new("customer", doc! { "_id": 1 }, doc! { "$unset": { "profile": "" } })
                    .single()
            ],
            store.updates()
        );
        assert_eq!(1, outcome.affected);
    }

    #[test]
    fn removing_an_embeddable_row_clears_its_copies() {
        let store = RecordingStore::new().with_aggregate_result(vec![doc! { "_id": "CA" }]);
        run(delete("state", Some(eq(col("state", "code"), string("CA")))), &store);
        assert_eq!(
            vec![
                crate::store::recording::Call::Aggregate {
                    collection: "state".to_string(),
                    pipeline: vec![
                        doc! { "$match": { "_id": { "$eq": "CA" } } },
                        doc! { "$project": { "_id": 1 } },
                    ],
                },
                crate::store::recording::Call::Remove {
                    collection: "state".to_string(),
                    filter: doc! { "_id": { "$eq": "CA" } },
                },
                crate::store::recording::Call::Update(UpdateRequest::new(
                    "customer",
                    doc! { "state_code": "CA" },
                    doc! { "$unset": { "state": "" } },
                )),
            ],
            store.calls()
        );
    }
}

mod update {
    use super::*;
    use crate::{
        store::{recording::RecordingStore, AggregateRequest, MutationRequest, UpdateRequest},
        write::{CopyChange, CopyPatch, DirectPlan, Error, Propagation, WritePlan},
    };
    use bson::{doc, Bson};

    test_translate_write!(
        embeddable_row_update_propagates_to_copies,
        expected = Ok(WritePlan::Direct(DirectPlan {
            table: "state".to_string(),
            mutation: MutationRequest::Update(UpdateRequest::new(
                "state",
                doc! { "_id": { "$eq": "CA" } },
                doc! { "$set": { "name": "Cal" } },
            )),
            copies: vec![],
            propagation: Some(Propagation {
                key_query: AggregateRequest {
                    collection: "state".to_string(),
                    pipeline: vec![
                        doc! { "$match": { "_id": { "$eq": "CA" } } },
                        doc! { "$project": { "_id": 1 } },
                    ],
                },
                key_columns: vec!["code".to_string()],
                patches: vec![CopyPatch {
                    collection: "customer".to_string(),
                    key_paths: vec!["state_code".to_string()],
                    copy_path: "state".to_string(),
                    array_filter: None,
                    change: CopyChange::Set(vec![(
                        "name".to_string(),
                        Bson::String("Cal".to_string())
                    )]),
                }],
            }),
        })),
        input = update(
            "state",
            vec![("name", string("Cal"))],
            Some(eq(col("state", "code"), string("CA"))),
        ),
    );

    test_translate_write!(
        primary_key_cannot_change,
        expected = Err(Error::PrimaryKeyUpdate("id".to_string())),
        input = update("customer", vec![("id", int(5))], None),
    );

    test_translate_write!(
        merged_row_cannot_move_to_another_parent,
        expected = Err(Error::Unsupported(
            "moving a row of 'orders' to another parent through 'customer_id'".to_string()
        )),
        input = update("orders", vec![("customer_id", int(2))], None),
    );

    test_translate_write!(
        assigned_values_must_be_constants,
        expected = Err(Error::NonLiteralValue(crate::ast::PrettyPrint::pretty_print(
            &col("customer", "state_code")
        ))),
        input = update("customer", vec![("name", col("customer", "state_code"))], None),
    );

    test_translate_write!(
        select_is_not_a_write,
        expected = Err(Error::Unsupported("SELECT is not a write".to_string())),
        input = Command::Select(crate::ast::Select {
            distinct: false,
            columns: vec![],
            from: crate::ast::FromClause {
                base: crate::ast::TableRef {
                    name: "customer".to_string(),
                    alias: None,
                },
                joins: vec![],
            },
            filter: None,
            group_by: vec![],
            having: None,
            order_by: vec![],
            limit: None,
            offset: None,
        }),
    );

    #[test]
    fn product_copies_inside_arrays_are_patched_by_identifier() {
        let store = RecordingStore::new().with_aggregate_result(vec![doc! { "_id": 3 }]);
        let outcome = run(
            update(
                "product",
                vec![("price", double(5.0))],
                Some(eq(col("product", "id"), int(3))),
            ),
            &store,
        );
        assert_eq!(
            vec![
                UpdateRequest::new(
                    "product",
                    doc! { "_id": { "$eq": 3 } },
                    doc! { "$set": { "price": 5.0 } },
                ),
                UpdateRequest::new(
                    "customer",
                    doc! { "orders.product_id": 3 },
                    doc! { "$set": { "orders.$[c].product.price": 5.0 } },
                )
                .with_array_filters(vec![doc! { "c.product_id": 3 }]),
            ],
            store.updates()
        );
        assert_eq!(1, outcome.affected);
    }

    #[test]
    fn failed_propagation_is_a_warning() {
        let store = RecordingStore::new().with_aggregate_result(vec![doc! { "_id": "CA" }]);
        *store.fail_updates_on.borrow_mut() = Some("customer".to_string());
        let outcome = run(
            update(
                "state",
                vec![("name", string("Cal"))],
                Some(eq(col("state", "code"), string("CA"))),
            ),
            &store,
        );
        assert_eq!(1, outcome.affected);
        assert_eq!(1, outcome.warnings.len());
        assert!(outcome.warnings[0].starts_with("copies of 'state' in 'customer'"));
    }

    #[test]
    fn new_reference_refreshes_the_copy() {
        let store = RecordingStore::new()
            .with_find_one_result(Some(doc! { "_id": "OR", "name": "Oregon" }));
        run(
            update(
                "customer",
                vec![("state_code", string("OR"))],
                Some(eq(col("customer", "id"), int(1))),
            ),
            &store,
        );
        assert_eq!(
            vec![UpdateRequest::new(
                "customer",
                doc! { "_id": { "$eq": 1 } },
                doc! { "$set": { "state_code": "OR", "state": { "name": "Oregon" } } },
            )],
            store.updates()
        );
    }

    #[test]
    fn cleared_reference_clears_the_copy() {
        let store = RecordingStore::new();
        run(
            update(
                "customer",
                vec![("state_code", Expression::literal(Value::Null))],
                Some(eq(col("customer", "id"), int(1))),
            ),
            &store,
        );
        assert_eq!(
            vec![UpdateRequest::new(
                "customer",
                doc! { "_id": { "$eq": 1 } },
                doc! { "$unset": { "state_code": "", "state": "" } },
            )],
            store.updates()
        );
        assert!(!store
            .calls()
            .iter()
            .any(|c| matches!(c, crate::store::recording::Call::FindOne { .. })));
    }

    #[test]
    fn merged_rows_are_updated_by_position() {
        let store = RecordingStore::new().with_aggregate_result(vec![doc! {
            "_id": 1,
            "orders": [{ "_id": 7, "amount": 1.0 }, { "_id": 8, "amount": 3.0 }],
        }]);
        let outcome = run(
            update("orders", vec![("amount", double(2.5))], Some(eq(col("orders", "id"), int(8)))),
            &store,
        );
        assert_eq!(
            vec![UpdateRequest::new(
                "customer",
                doc! { "_id": 1 },
                doc! { "$set": { "orders.1.amount": 2.5 } },
            )
            .single()],
            store.updates()
        );
        assert_eq!(1, outcome.affected);
    }

    #[test]
    fn nested_rows_are_addressed_through_every_array() {
        let store = RecordingStore::new().with_aggregate_result(vec![doc! {
            "_id": 1,
            "orders": [{ "_id": 7, "lineitem": [{ "_id": 1, "qty": 1 }, { "_id": 2, "qty": 1 }] }],
        }]);
        run(
            update(
                "lineitem",
                vec![("qty", int(9))],
                Some(Expression::And(vec![
                    eq(col("lineitem", "order_id"), int(7)),
                    eq(col("lineitem", "line_no"), int(2)),
                ])),
            ),
            &store,
        );
        assert_eq!(
            vec![UpdateRequest::new(
                "customer",
                doc! { "_id": 1 },
                doc! { "$set": { "orders.0.lineitem.1.qty": 9 } },
            )
            .single()],
            store.updates()
        );
    }
}

mod eval {
    use super::*;
    use crate::{
        ast::{ColumnRef, InExpr, IsNullExpr},
        write::{eval::evaluate, Error},
    };

    fn no_columns(c: &ColumnRef) -> crate::write::Result<Value> {
        Err(Error::UnknownColumn {
            table: c.table.clone(),
            column: c.column.clone(),
        })
    }

    fn null() -> Expression {
        Expression::literal(Value::Null)
    }

    fn boolean(b: bool) -> Expression {
        Expression::literal(Value::Boolean(b))
    }

    fn eval(expr: Expression) -> Value {
        evaluate(&expr, &no_columns).expect("evaluation failed")
    }

    #[test]
    fn comparison_with_null_is_unknown() {
        assert_eq!(Value::Null, eval(eq(int(1), null())));
    }

    #[test]
    fn and_is_false_when_any_term_is_false() {
        assert_eq!(
            Value::Boolean(false),
            eval(Expression::And(vec![eq(int(1), null()), boolean(false)]))
        );
        assert_eq!(
            Value::Null,
            eval(Expression::And(vec![eq(int(1), null()), boolean(true)]))
        );
    }

    #[test]
    fn or_is_true_when_any_term_is_true() {
        assert_eq!(
            Value::Boolean(true),
            eval(Expression::Or(vec![eq(int(1), null()), boolean(true)]))
        );
    }

    #[test]
    fn not_unknown_is_unknown() {
        assert_eq!(Value::Null, eval(Expression::Not(Box::new(eq(int(1), null())))));
    }

    #[test]
    fn in_list_with_null_is_unknown_when_not_found() {
        let in_list = |negated| {
            Expression::In(InExpr {
                expr: Box::new(int(3)),
                list: vec![int(1), null()],
                negated,
            })
        };
        assert_eq!(Value::Null, eval(in_list(false)));
        assert_eq!(Value::Null, eval(in_list(true)));
    }

    #[test]
    fn is_null_is_never_unknown() {
        assert_eq!(
            Value::Boolean(true),
            eval(Expression::IsNull(IsNullExpr {
                expr: Box::new(null()),
                negated: false,
            }))
        );
    }

    #[test]
    fn functions_evaluate_locally() {
        assert_eq!(
            Value::Boolean(true),
            eval(eq(
                Expression::function("upper", vec![string("ab")]),
                string("AB")
            ))
        );
        assert_eq!(
            Value::Long(5),
            eval(Expression::function("+", vec![int(2), int(3)]))
        );
    }

    #[test]
    fn abs_widens_instead_of_overflowing() {
        assert_eq!(
            Value::Long(2_147_483_648),
            eval(Expression::function(
                "abs",
                vec![Expression::literal(Value::Integer(i32::MIN))]
            ))
        );
        assert_eq!(
            Value::Double(9_223_372_036_854_775_808.0),
            eval(Expression::function(
                "abs",
                vec![Expression::literal(Value::Long(i64::MIN))]
            ))
        );
    }

    #[test]
    fn unknown_function_cannot_be_evaluated() {
        let expr = Expression::function("soundex", vec![string("a")]);
        assert_eq!(
            Err(Error::Evaluation(crate::ast::PrettyPrint::pretty_print(&expr))),
            evaluate(&expr, &no_columns)
        );
    }
}
