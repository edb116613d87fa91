macro_rules! test_codegen_match {
    ($func_name:ident, expected = $expected:expr, input = $input:expr,) => {
        #[test]
        fn $func_name() {
            use crate::codegen::MqlCodeGenerator;
            let expected = $expected;
            let input = $input;
            assert_eq!(expected, MqlCodeGenerator.codegen_match_query(input));
        }
    };
}

mod match_query {
    use crate::translator::{
        ElemMatch, MatchComparison, MatchComparisonOp, MatchIn, MatchQuery, MatchRegex,
    };
    use bson::{bson, doc, Bson};

    fn compare(input: Option<&str>, op: MatchComparisonOp, arg: Bson) -> MatchQuery {
        MatchQuery::Comparison(MatchComparison {
            input: input.map(String::from),
            op,
            arg,
        })
    }

    test_codegen_match!(
        comparison,
        expected = doc! { "orders.amount": { "$gt": 10.5 } },
        input = compare(Some("orders.amount"), MatchComparisonOp::Gt, Bson::Double(10.5)),
    );

    test_codegen_match!(
        comparison_without_input,
        expected = doc! { "$lte": 3 },
        input = compare(None, MatchComparisonOp::Lte, Bson::Int32(3)),
    );

    test_codegen_match!(
        negated_in,
        expected = doc! { "status": { "$nin": ["open", "void", null] } },
        input = MatchQuery::In(MatchIn {
            input: Some("status".to_string()),
            args: vec![bson!("open"), bson!("void")],
            negated: true,
        }),
    );

    test_codegen_match!(
        not_equal_excludes_null,
        expected = doc! { "qty": { "$nin": [5, null] } },
        input = compare(Some("qty"), MatchComparisonOp::Ne, Bson::Int32(5)),
    );

    test_codegen_match!(
        not_null_stays_ne,
        expected = doc! { "qty": { "$ne": null } },
        input = compare(Some("qty"), MatchComparisonOp::Ne, Bson::Null),
    );

    test_codegen_match!(
        regex,
        expected = doc! { "name": { "$regex": "^FRE.*M$", "$options": "s" } },
        input = MatchQuery::Regex(MatchRegex {
            input: Some("name".to_string()),
            regex: "^FRE.*M$".to_string(),
            options: "s".to_string(),
            negated: false,
        }),
    );

    test_codegen_match!(
        negated_regex,
        expected = doc! { "name": { "$not": { "$regex": "DOM$", "$options": "" }, "$ne": null } },
        input = MatchQuery::Regex(MatchRegex {
            input: Some("name".to_string()),
            regex: "DOM$".to_string(),
            options: "".to_string(),
            negated: true,
        }),
    );

    test_codegen_match!(
        logical_operators_nest,
        expected = doc! { "$and": [
            { "a": { "$eq": 1 } },
            { "$nor": [{ "b": { "$eq": 2 } }, { "c": { "$eq": 3 } }] },
        ]},
        input = MatchQuery::And(vec![
            compare(Some("a"), MatchComparisonOp::Eq, Bson::Int32(1)),
            MatchQuery::Nor(vec![
                compare(Some("b"), MatchComparisonOp::Eq, Bson::Int32(2)),
                compare(Some("c"), MatchComparisonOp::Eq, Bson::Int32(3)),
            ]),
        ]),
    );

    test_codegen_match!(
        single_term_and_collapses,
        expected = doc! { "a": { "$eq": 1 } },
        input = MatchQuery::And(vec![compare(Some("a"), MatchComparisonOp::Eq, Bson::Int32(1))]),
    );

    test_codegen_match!(
        elem_match,
        expected = doc! { "orders": { "$elemMatch": { "status": { "$eq": "open" } } } },
        input = MatchQuery::ElemMatch(ElemMatch {
            input: "orders".to_string(),
            condition: Box::new(compare(
                Some("status"),
                MatchComparisonOp::Eq,
                bson!("open")
            )),
        }),
    );

    test_codegen_match!(
        expr,
        expected = doc! { "$expr": { "$gt": ["$a", "$b"] } },
        input = MatchQuery::Expr(bson!({ "$gt": ["$a", "$b"] })),
    );
}

mod pipeline {
    use crate::{
        codegen::generate_pipeline,
        planner::MergePlanner,
        translator::{
            Accumulator, AccumulatorFunction, Group, GroupKeys, MatchComparison, MatchComparisonOp,
            MatchQuery, Pipeline, Project, ProjectItem, SortKey,
        },
    };
    use bson::{bson, doc, Bson};

    fn empty() -> Pipeline {
        Pipeline {
            collection: "customer".to_string(),
            pre_stages: vec![],
            pre_match_project: None,
            filter: None,
            group: None,
            having: None,
            project: None,
            sort: vec![],
            skip: None,
            limit: None,
        }
    }

    #[test]
    fn empty_pipeline_has_no_stages() {
        assert!(generate_pipeline(empty()).is_empty());
    }

    #[test]
    fn stages_are_emitted_in_fixed_order() {
        let mut planner = MergePlanner::new();
        planner.add_existence_filter("profile");
        planner.add_array_flatten("orders");
        planner.add_projection_fragment(bson!({ "$ifNull": ["$x", [{}]] }), "__x");

        let pipeline = Pipeline {
            pre_stages: planner.nodes().cloned().collect(),
            pre_match_project: Some(Project {
                fields: vec![
                    ("__m0".to_string(), ProjectItem::Expression(bson!({ "$gt": ["$a", "$b"] }))),
                    ("a".to_string(), ProjectItem::Include),
                ],
                exclude_id: false,
            }),
            filter: Some(MatchQuery::Comparison(MatchComparison {
                input: Some("__m0".to_string()),
                op: MatchComparisonOp::Eq,
                arg: Bson::Boolean(true),
            })),
            group: Some(Group {
                keys: GroupKeys::Single(bson!("$a")),
                accumulators: vec![Accumulator {
                    name: "n".to_string(),
                    function: AccumulatorFunction::Sum,
                    arg: bson!(1),
                }],
            }),
            having: Some(MatchQuery::Comparison(MatchComparison {
                input: Some("n".to_string()),
                op: MatchComparisonOp::Gt,
                arg: Bson::Int32(2),
            })),
            sort: vec![SortKey {
                path: "n".to_string(),
                ascending: false,
            }],
            skip: Some(5),
            limit: Some(10),
            ..empty()
        };

        assert_eq!(
            vec![
                doc! { "$match": { "profile": { "$exists": true, "$ne": null } } },
                doc! { "$unwind": "$orders" },
                doc! { "$addFields": { "__x": { "$ifNull": ["$x", [{}]] } } },
                doc! { "$project": { "__m0": { "$gt": ["$a", "$b"] }, "a": 1 } },
                doc! { "$match": { "__m0": { "$eq": true } } },
                doc! { "$group": { "_id": "$a", "n": { "$sum": 1 } } },
                doc! { "$match": { "n": { "$gt": 2 } } },
                doc! { "$sort": { "n": -1 } },
                doc! { "$skip": 5_i64 },
                doc! { "$limit": 10_i64 },
            ],
            generate_pipeline(pipeline)
        );
    }

    #[test]
    fn compound_group_keys_and_final_projection() {
        let pipeline = Pipeline {
            group: Some(Group {
                keys: GroupKeys::Compound(vec![
                    ("state_code".to_string(), bson!("$state_code")),
                    ("_k1".to_string(), bson!({ "$year": "$joined" })),
                ]),
                accumulators: vec![Accumulator {
                    name: "total".to_string(),
                    function: AccumulatorFunction::Avg,
                    arg: bson!("$orders.amount"),
                }],
            }),
            project: Some(Project {
                fields: vec![
                    ("state_code".to_string(), ProjectItem::Expression(bson!("$_id.state_code"))),
                    ("total".to_string(), ProjectItem::Expression(bson!("$total"))),
                ],
                exclude_id: true,
            }),
            ..empty()
        };
        assert_eq!(
            vec![
                doc! { "$group": {
                    "_id": { "state_code": "$state_code", "_k1": { "$year": "$joined" } },
                    "total": { "$avg": "$orders.amount" },
                }},
                doc! { "$project": { "_id": 0, "state_code": "$_id.state_code", "total": "$total" } },
            ],
            generate_pipeline(pipeline)
        );
    }
}
