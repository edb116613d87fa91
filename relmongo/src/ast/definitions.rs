use crate::types::Value;
use serde::{Deserialize, Serialize};

#[allow(clippy::large_enum_variant)]
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Select {
    #[serde(default)]
    pub distinct: bool,
    pub columns: Vec<DerivedColumn>,
    pub from: FromClause,
    #[serde(default)]
    pub filter: Option<Expression>,
    #[serde(default)]
    pub group_by: Vec<Expression>,
    #[serde(default)]
    pub having: Option<Expression>,
    #[serde(default)]
    pub order_by: Vec<SortSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct DerivedColumn {
    pub expr: Expression,
    #[serde(default)]
    pub alias: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FromClause {
    pub base: TableRef,
    #[serde(default)]
    pub joins: Vec<Join>,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl TableRef {
    /// The name column references use for this table: the alias when present.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    #[serde(default)]
    pub condition: Option<Expression>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
    Cross,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    pub expr: Expression,
    #[serde(default = "ascending")]
    pub ascending: bool,
}

fn ascending() -> bool {
    true
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Expression>>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub filter: Option<Expression>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub column: String,
    pub value: Expression,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Delete {
    pub table: String,
    #[serde(default)]
    pub filter: Option<Expression>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Column(ColumnRef),
    Literal(Value),
    Comparison(ComparisonExpr),
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
    In(InExpr),
    IsNull(IsNullExpr),
    Like(LikeExpr),
    Function(FunctionExpr),
    Aggregate(AggregateExpr),
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    /// The table name or alias the column is qualified with.
    pub table: String,
    pub column: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonExpr {
    pub op: ComparisonOp,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl ComparisonOp {
    /// The operator that yields the same result with its operands swapped.
    pub fn flip(self) -> Self {
        use ComparisonOp::*;
        match self {
            Eq => Eq,
            Neq => Neq,
            Lt => Gt,
            Lte => Gte,
            Gt => Lt,
            Gte => Lte,
        }
    }

    pub fn negate(self) -> Self {
        use ComparisonOp::*;
        match self {
            Eq => Neq,
            Neq => Eq,
            Lt => Gte,
            Lte => Gt,
            Gt => Lte,
            Gte => Lt,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct InExpr {
    pub expr: Box<Expression>,
    pub list: Vec<Expression>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct IsNullExpr {
    pub expr: Box<Expression>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LikeExpr {
    pub expr: Box<Expression>,
    pub pattern: Box<Expression>,
    #[serde(default)]
    pub escape: Option<char>,
    #[serde(default)]
    pub negated: bool,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FunctionExpr {
    pub name: String,
    pub args: Vec<Expression>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    /// None only for COUNT(*).
    #[serde(default)]
    pub arg: Option<Box<Expression>>,
    #[serde(default)]
    pub distinct: bool,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Expression {
    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expression::Column(ColumnRef {
            table: table.into(),
            column: column.into(),
        })
    }

    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }

    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison(ComparisonExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function(FunctionExpr {
            name: name.into(),
            args,
        })
    }

    pub fn aggregate(function: AggregateFunction, arg: Option<Expression>) -> Self {
        Expression::Aggregate(AggregateExpr {
            function,
            arg: arg.map(Box::new),
            distinct: false,
        })
    }

    /// Splits a conjunction into its conjuncts, flattening nested ANDs.
    pub fn conjuncts(self) -> Vec<Expression> {
        match self {
            Expression::And(terms) => terms.into_iter().flat_map(Expression::conjuncts).collect(),
            e => vec![e],
        }
    }

    /// Whether the expression, or any sub-expression, is an aggregate.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expression::Aggregate(_) => true,
            Expression::Column(_) | Expression::Literal(_) => false,
            Expression::Comparison(c) => c.left.contains_aggregate() || c.right.contains_aggregate(),
            Expression::And(terms) | Expression::Or(terms) => {
                terms.iter().any(Expression::contains_aggregate)
            }
            Expression::Not(e) => e.contains_aggregate(),
            Expression::In(i) => {
                i.expr.contains_aggregate() || i.list.iter().any(Expression::contains_aggregate)
            }
            Expression::IsNull(i) => i.expr.contains_aggregate(),
            Expression::Like(l) => l.expr.contains_aggregate() || l.pattern.contains_aggregate(),
            Expression::Function(f) => f.args.iter().any(Expression::contains_aggregate),
        }
    }

    /// Every column referenced by the expression, in visiting order.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = vec![];
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Expression::Column(c) => out.push(c),
            Expression::Literal(_) => {}
            Expression::Comparison(c) => {
                c.left.collect_columns(out);
                c.right.collect_columns(out);
            }
            Expression::And(terms) | Expression::Or(terms) => {
                terms.iter().for_each(|t| t.collect_columns(out))
            }
            Expression::Not(e) => e.collect_columns(out),
            Expression::In(i) => {
                i.expr.collect_columns(out);
                i.list.iter().for_each(|t| t.collect_columns(out));
            }
            Expression::IsNull(i) => i.expr.collect_columns(out),
            Expression::Like(l) => {
                l.expr.collect_columns(out);
                l.pattern.collect_columns(out);
            }
            Expression::Function(f) => f.args.iter().for_each(|t| t.collect_columns(out)),
            Expression::Aggregate(a) => {
                if let Some(arg) = &a.arg {
                    arg.collect_columns(out)
                }
            }
        }
    }
}
