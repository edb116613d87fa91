use crate::planner::ProcessingNode;
use bson::Bson;

/// A translated SELECT, one field per pipeline position.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub collection: String,
    pub pre_stages: Vec<ProcessingNode>,
    /// Present when a filter reads computed values, which must be projected
    /// before the main match can see them.
    pub pre_match_project: Option<Project>,
    pub filter: Option<MatchQuery>,
    pub group: Option<Group>,
    pub having: Option<MatchQuery>,
    pub project: Option<Project>,
    pub sort: Vec<SortKey>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub keys: GroupKeys,
    pub accumulators: Vec<Accumulator>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupKeys {
    /// One group for the whole input.
    Null,
    Single(Bson),
    Compound(Vec<(String, Bson)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub name: String,
    pub function: AccumulatorFunction,
    pub arg: Bson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorFunction {
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub fields: Vec<(String, ProjectItem)>,
    pub exclude_id: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectItem {
    /// Keep a stored field as it is.
    Include,
    Expression(Bson),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: String,
    pub ascending: bool,
}

/// The match language. An absent `input` means the condition applies to the
/// element itself, as under `$elemMatch` or `$pull`.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchQuery {
    And(Vec<MatchQuery>),
    Or(Vec<MatchQuery>),
    Nor(Vec<MatchQuery>),
    Comparison(MatchComparison),
    In(MatchIn),
    Regex(MatchRegex),
    ElemMatch(ElemMatch),
    /// An aggregation expression evaluated per document.
    Expr(Bson),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchComparison {
    pub input: Option<String>,
    pub op: MatchComparisonOp,
    pub arg: Bson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchComparisonOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchIn {
    pub input: Option<String>,
    pub args: Vec<Bson>,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRegex {
    pub input: Option<String>,
    pub regex: String,
    pub options: String,
    pub negated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElemMatch {
    pub input: String,
    pub condition: Box<MatchQuery>,
}

impl MatchQuery {
    /// Conjunction that avoids wrapping a single term.
    pub fn all(mut terms: Vec<MatchQuery>) -> Option<MatchQuery> {
        match terms.len() {
            0 => None,
            1 => terms.pop(),
            _ => Some(MatchQuery::And(terms)),
        }
    }

    pub fn negate(self) -> MatchQuery {
        use MatchComparisonOp::*;
        match self {
            MatchQuery::Comparison(c) => MatchQuery::Comparison(MatchComparison {
                op: match c.op {
                    Eq => Ne,
                    Ne => Eq,
                    Lt => Gte,
                    Lte => Gt,
                    Gt => Lte,
                    Gte => Lt,
                },
                ..c
            }),
            MatchQuery::In(i) => MatchQuery::In(MatchIn {
                negated: !i.negated,
                ..i
            }),
            MatchQuery::Regex(r) => MatchQuery::Regex(MatchRegex {
                negated: !r.negated,
                ..r
            }),
            // term by term, so every comparison keeps excluding NULL
            MatchQuery::Or(terms) => {
                MatchQuery::And(terms.into_iter().map(MatchQuery::negate).collect())
            }
            MatchQuery::And(terms) => {
                MatchQuery::Or(terms.into_iter().map(MatchQuery::negate).collect())
            }
            MatchQuery::Nor(terms) => MatchQuery::Or(terms),
            MatchQuery::Expr(e) => MatchQuery::Expr(bson::bson!({ "$not": [e] })),
            q @ MatchQuery::ElemMatch(_) => MatchQuery::Nor(vec![q]),
        }
    }
}
