use crate::ast::*;
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref REGULAR_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

fn identifier_to_string(s: &str) -> String {
    if REGULAR_IDENTIFIER.is_match(s) {
        s.to_string()
    } else {
        format!("`{}`", s.replace('`', "``"))
    }
}

/// A trait for AST nodes that render back to SQL text.
///
/// The rendered form of an expression doubles as its structural fingerprint:
/// two expressions with the same rendering translate to the same store
/// expression.
pub trait PrettyPrint {
    fn pretty_print(&self) -> String;
}

impl PrettyPrint for Command {
    fn pretty_print(&self) -> String {
        match self {
            Command::Select(s) => s.pretty_print(),
            Command::Insert(i) => i.pretty_print(),
            Command::Update(u) => u.pretty_print(),
            Command::Delete(d) => d.pretty_print(),
        }
    }
}

impl PrettyPrint for Select {
    fn pretty_print(&self) -> String {
        format!(
            "SELECT{} {} FROM {}{}{}{}{}{}{}",
            if self.distinct { " DISTINCT" } else { "" },
            self.columns.iter().map(|c| c.pretty_print()).join(", "),
            self.from.pretty_print(),
            self.filter
                .as_ref()
                .map_or("".to_string(), |f| format!(" WHERE {}", f.pretty_print())),
            if self.group_by.is_empty() {
                "".to_string()
            } else {
                format!(
                    " GROUP BY {}",
                    self.group_by.iter().map(|g| g.pretty_print()).join(", ")
                )
            },
            self.having
                .as_ref()
                .map_or("".to_string(), |h| format!(" HAVING {}", h.pretty_print())),
            if self.order_by.is_empty() {
                "".to_string()
            } else {
                format!(
                    " ORDER BY {}",
                    self.order_by.iter().map(|s| s.pretty_print()).join(", ")
                )
            },
            self.limit.map_or("".to_string(), |l| format!(" LIMIT {l}")),
            self.offset.map_or("".to_string(), |o| format!(" OFFSET {o}")),
        )
    }
}

impl PrettyPrint for DerivedColumn {
    fn pretty_print(&self) -> String {
        match &self.alias {
            Some(alias) => format!(
                "{} AS {}",
                self.expr.pretty_print(),
                identifier_to_string(alias)
            ),
            None => self.expr.pretty_print(),
        }
    }
}

impl PrettyPrint for FromClause {
    fn pretty_print(&self) -> String {
        let mut out = self.base.pretty_print();
        for join in &self.joins {
            out.push(' ');
            out.push_str(&join.pretty_print());
        }
        out
    }
}

impl PrettyPrint for TableRef {
    fn pretty_print(&self) -> String {
        match &self.alias {
            Some(alias) => format!(
                "{} AS {}",
                identifier_to_string(&self.name),
                identifier_to_string(alias)
            ),
            None => identifier_to_string(&self.name),
        }
    }
}

impl PrettyPrint for Join {
    fn pretty_print(&self) -> String {
        let kind = match self.join_type {
            JoinType::Inner => "INNER JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
            JoinType::RightOuter => "RIGHT OUTER JOIN",
            JoinType::FullOuter => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        };
        match &self.condition {
            Some(cond) => format!(
                "{kind} {} ON {}",
                self.table.pretty_print(),
                cond.pretty_print()
            ),
            None => format!("{kind} {}", self.table.pretty_print()),
        }
    }
}

impl PrettyPrint for SortSpec {
    fn pretty_print(&self) -> String {
        format!(
            "{} {}",
            self.expr.pretty_print(),
            if self.ascending { "ASC" } else { "DESC" }
        )
    }
}

impl PrettyPrint for Insert {
    fn pretty_print(&self) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            identifier_to_string(&self.table),
            self.columns.iter().map(|c| identifier_to_string(c)).join(", "),
            self.rows
                .iter()
                .map(|r| format!("({})", r.iter().map(|v| v.pretty_print()).join(", ")))
                .join(", ")
        )
    }
}

impl PrettyPrint for Update {
    fn pretty_print(&self) -> String {
        format!(
            "UPDATE {} SET {}{}",
            identifier_to_string(&self.table),
            self.assignments
                .iter()
                .map(|a| format!(
                    "{} = {}",
                    identifier_to_string(&a.column),
                    a.value.pretty_print()
                ))
                .join(", "),
            self.filter
                .as_ref()
                .map_or("".to_string(), |f| format!(" WHERE {}", f.pretty_print())),
        )
    }
}

impl PrettyPrint for Delete {
    fn pretty_print(&self) -> String {
        format!(
            "DELETE FROM {}{}",
            identifier_to_string(&self.table),
            self.filter
                .as_ref()
                .map_or("".to_string(), |f| format!(" WHERE {}", f.pretty_print())),
        )
    }
}

impl PrettyPrint for ComparisonOp {
    fn pretty_print(&self) -> String {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
        }
        .to_string()
    }
}

impl PrettyPrint for AggregateFunction {
    fn pretty_print(&self) -> String {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
        .to_string()
    }
}

impl PrettyPrint for Expression {
    fn pretty_print(&self) -> String {
        match self {
            Expression::Column(c) if c.table.is_empty() => identifier_to_string(&c.column),
            Expression::Column(c) => format!(
                "{}.{}",
                identifier_to_string(&c.table),
                identifier_to_string(&c.column)
            ),
            Expression::Literal(v) => v.to_string(),
            Expression::Comparison(c) => format!(
                "({} {} {})",
                c.left.pretty_print(),
                c.op.pretty_print(),
                c.right.pretty_print()
            ),
            Expression::And(terms) => {
                format!("({})", terms.iter().map(|t| t.pretty_print()).join(" AND "))
            }
            Expression::Or(terms) => {
                format!("({})", terms.iter().map(|t| t.pretty_print()).join(" OR "))
            }
            Expression::Not(e) => format!("NOT {}", e.pretty_print()),
            Expression::In(i) => format!(
                "({}{} IN ({}))",
                i.expr.pretty_print(),
                if i.negated { " NOT" } else { "" },
                i.list.iter().map(|e| e.pretty_print()).join(", ")
            ),
            Expression::IsNull(i) => format!(
                "({} IS{} NULL)",
                i.expr.pretty_print(),
                if i.negated { " NOT" } else { "" }
            ),
            Expression::Like(l) => format!(
                "({}{} LIKE {}{})",
                l.expr.pretty_print(),
                if l.negated { " NOT" } else { "" },
                l.pattern.pretty_print(),
                l.escape
                    .map_or("".to_string(), |c| format!(" ESCAPE '{c}'"))
            ),
            Expression::Function(f) => format!(
                "{}({})",
                f.name.to_uppercase(),
                f.args.iter().map(|a| a.pretty_print()).join(", ")
            ),
            Expression::Aggregate(a) => format!(
                "{}({}{})",
                a.function.pretty_print(),
                if a.distinct { "DISTINCT " } else { "" },
                a.arg
                    .as_ref()
                    .map_or("*".to_string(), |arg| arg.pretty_print())
            ),
        }
    }
}
