use crate::{ast::*, types::Value};

macro_rules! test_pretty_print {
    ($func_name:ident, expected = $expected:expr, input = $input:expr $(,)?) => {
        #[test]
        fn $func_name() {
            use crate::ast::PrettyPrint;
            assert_eq!($expected, $input.pretty_print());
        }
    };
}

test_pretty_print!(
    column_reference,
    expected = "c.name",
    input = Expression::column("c", "name"),
);

test_pretty_print!(
    unqualified_column_reference,
    expected = "name",
    input = Expression::column("", "name"),
);

test_pretty_print!(
    delimited_identifier,
    expected = "`my table`.`a``b`",
    input = Expression::column("my table", "a`b"),
);

test_pretty_print!(
    comparison,
    expected = "(o.amount >= 10)",
    input = Expression::compare(
        ComparisonOp::Gte,
        Expression::column("o", "amount"),
        Expression::literal(Value::Integer(10)),
    ),
);

test_pretty_print!(
    count_star,
    expected = "COUNT(*)",
    input = Expression::aggregate(AggregateFunction::Count, None),
);

test_pretty_print!(
    function_names_are_case_normalized,
    expected = "UPPER(c.name)",
    input = Expression::function("upper", vec![Expression::column("c", "name")]),
);

test_pretty_print!(
    not_like_with_escape,
    expected = "(c.name NOT LIKE 'a!%%' ESCAPE '!')",
    input = Expression::Like(LikeExpr {
        expr: Box::new(Expression::column("c", "name")),
        pattern: Box::new(Expression::literal(Value::String("a!%%".to_string()))),
        escape: Some('!'),
        negated: true,
    }),
);

test_pretty_print!(
    select_with_join_and_paging,
    expected = "SELECT c.name AS n FROM customer AS c INNER JOIN orders AS o ON (c.id = o.customer_id) ORDER BY c.name DESC LIMIT 5 OFFSET 10",
    input = Select {
        distinct: false,
        columns: vec![DerivedColumn {
            expr: Expression::column("c", "name"),
            alias: Some("n".to_string()),
        }],
        from: FromClause {
            base: TableRef {
                name: "customer".to_string(),
                alias: Some("c".to_string()),
            },
            joins: vec![Join {
                join_type: JoinType::Inner,
                table: TableRef {
                    name: "orders".to_string(),
                    alias: Some("o".to_string()),
                },
                condition: Some(Expression::compare(
                    ComparisonOp::Eq,
                    Expression::column("c", "id"),
                    Expression::column("o", "customer_id"),
                )),
            }],
        },
        filter: None,
        group_by: vec![],
        having: None,
        order_by: vec![SortSpec {
            expr: Expression::column("c", "name"),
            ascending: false,
        }],
        limit: Some(5),
        offset: Some(10),
    },
);
