use crate::{
    ast::{DerivedColumn, Expression, PrettyPrint, Select},
    mapping_registry::ColumnDetail,
    translator::{
        expressions::is_plain_field, first_error, sources::Placement, Error, ExpressionTranslator,
        Group, GroupKeys, MatchQuery, OutputColumn, Pipeline, Project, ProjectItem, Result, Scope,
        SortKey,
    },
};
use bson::Bson;
use std::collections::BTreeSet;

pub(crate) struct SelectTranslator<'a, 'c> {
    exprs: ExpressionTranslator<'a, 'c>,
    placement: Placement,
}

/// A select item after translation.
struct Output {
    column: OutputColumn,
    expression: Bson,
}

impl<'a, 'c> SelectTranslator<'a, 'c> {
    pub fn new(exprs: ExpressionTranslator<'a, 'c>, placement: Placement) -> Self {
        Self { exprs, placement }
    }

    pub fn translate(mut self, select: &Select) -> Result<(Pipeline, Vec<OutputColumn>)> {
        let mut conditions = select
            .filter
            .clone()
            .map(Expression::conjuncts)
            .unwrap_or_default();
        conditions.extend(self.translate_join_conditions()?);
        let filter = self.translate_where(&conditions)?;

        let group = self.translate_group_by(select)?;
        let having = match &select.having {
            Some(having) => self.translate_having(having)?,
            None => None,
        };
        let scope = if group.is_some() {
            Scope::Grouped
        } else {
            Scope::Raw
        };
        let outputs = self.translate_select(&select.columns, scope)?;

        let grouped = group.is_some();
        let pbm = self.exprs.project_before_match;
        if pbm && grouped {
            for output in &outputs {
                if !output.column.path.starts_with("_id") && !self.is_accumulator(&output.column.path) {
                    return Err(Error::Unsupported(format!(
                        "computed output '{}' over grouped values when the filter reads computed values",
                        output.column.name
                    )));
                }
            }
        }

        let sort = self.translate_order_by(select, &outputs)?;
        let skip = select
            .offset
            .map(|o| i64::try_from(o).map_err(|_| Error::OffsetOutOfI64Range(o)))
            .transpose()?;
        let limit = select
            .limit
            .map(|l| i64::try_from(l).map_err(|_| Error::LimitOutOfI64Range(l)))
            .transpose()?;

        let (pre_match_project, project) = if pbm {
            (Some(self.pre_match_projection(&outputs, grouped)?), None)
        } else {
            let exclude_id = !outputs.iter().any(|o| o.column.name == "_id");
            let fields = outputs
                .iter()
                .map(|o| (o.column.name.clone(), ProjectItem::Expression(o.expression.clone())))
                .collect();
            (None, Some(Project { fields, exclude_id }))
        };

        let group = group.map(|keys| Group {
            keys,
            accumulators: self.exprs.accumulators.clone(),
        });
        let pipeline = Pipeline {
            collection: self.exprs.ctx.document(&self.placement.top)?.collection().to_string(),
            pre_stages: self.placement.planner.nodes().cloned().collect(),
            pre_match_project,
            filter,
            group,
            having,
            project,
            sort,
            skip,
            limit,
        };
        Ok((pipeline, outputs.into_iter().map(|o| o.column).collect()))
    }

    fn is_accumulator(&self, path: &str) -> bool {
        self.exprs.accumulators.iter().any(|a| a.name == path)
    }

    /// Drops the join conditions the document structure already implies and
    /// returns the rest, which filter like WHERE conjuncts.
    fn translate_join_conditions(&mut self) -> Result<Vec<Expression>> {
        let mut moved = vec![];
        for join in self.placement.joins.clone() {
            let Some(condition) = join.condition else {
                continue;
            };
            for term in condition.conjuncts() {
                if self.is_implied(&term)? {
                    continue;
                }
                if join.outer {
                    return Err(Error::Unsupported(format!(
                        "outer join condition {} not implied by the document structure",
                        term.pretty_print()
                    )));
                }
                if join.many && !matches!(term, Expression::Comparison(_)) {
                    return Err(Error::Unsupported(format!(
                        "join condition {} on a nested array",
                        term.pretty_print()
                    )));
                }
                moved.push(term);
            }
        }
        Ok(moved)
    }

    /// An equality between two columns stored in the same field.
    fn is_implied(&mut self, term: &Expression) -> Result<bool> {
        if let Expression::Comparison(c) = term {
            if let (crate::ast::ComparisonOp::Eq, Expression::Column(l), Expression::Column(r)) =
                (c.op, c.left.as_ref(), c.right.as_ref())
            {
                return Ok(self.exprs.resolve(l)?.path == self.exprs.resolve(r)?.path);
            }
        }
        Ok(false)
    }

    fn translate_where(&mut self, conditions: &[Expression]) -> Result<Option<MatchQuery>> {
        let results = conditions
            .iter()
            .map(|c| {
                if c.contains_aggregate() {
                    return Err(Error::AggregateNotAllowed(c.pretty_print()));
                }
                self.exprs.translate_filter(c, Scope::Raw)
            })
            .collect::<Vec<_>>();
        Ok(MatchQuery::all(first_error(results)?))
    }

    /// Registers the grouping keys, or the implicit single group when the
    /// query aggregates without GROUP BY. DISTINCT without aggregates groups by
    /// every select item.
    fn translate_group_by(&mut self, select: &Select) -> Result<Option<GroupKeys>> {
        let aggregates = select.columns.iter().any(|c| c.expr.contains_aggregate())
            || select.having.is_some()
            || select.order_by.iter().any(|o| o.expr.contains_aggregate());
        let keys: Vec<Expression> = if select.group_by.is_empty() && select.distinct && !aggregates {
            select.columns.iter().map(|c| c.expr.clone()).collect()
        } else {
            select.group_by.clone()
        };
        if keys.is_empty() {
            return Ok(aggregates.then_some(GroupKeys::Null));
        }

        let mut translated = vec![];
        let mut names = BTreeSet::new();
        for (i, key) in keys.iter().enumerate() {
            if key.contains_aggregate() {
                return Err(Error::AggregateNotAllowed(key.pretty_print()));
            }
            let expression = self.exprs.translate(key, Scope::Raw)?;
            let name = match key {
                Expression::Column(c) if is_plain_field(&c.column) && names.insert(c.column.to_lowercase()) => {
                    c.column.clone()
                }
                _ => format!("_k{i}"),
            };
            translated.push((key, name, expression));
        }

        let single = translated.len() == 1;
        for (key, name, expression) in &translated {
            let path = if single {
                "_id".to_string()
            } else {
                format!("_id.{name}")
            };
            self.exprs
                .registry
                .register(key.pretty_print(), ColumnDetail::new(expression.clone()))
                .grouped_path = Some(path);
        }
        Ok(Some(if single {
            GroupKeys::Single(translated.remove(0).2)
        } else {
            GroupKeys::Compound(
                translated
                    .into_iter()
                    .map(|(_, name, expression)| (name, expression))
                    .collect(),
            )
        }))
    }

    fn translate_having(&mut self, having: &Expression) -> Result<Option<MatchQuery>> {
        let results = having
            .clone()
            .conjuncts()
            .iter()
            .map(|c| self.exprs.translate_filter(c, Scope::Grouped))
            .collect::<Vec<_>>();
        Ok(MatchQuery::all(first_error(results)?))
    }

    fn translate_select(&mut self, columns: &[DerivedColumn], scope: Scope) -> Result<Vec<Output>> {
        let mut used = BTreeSet::new();
        let mut outputs = vec![];
        for (i, item) in columns.iter().enumerate() {
            let name = output_name(item, i, &mut used);
            let expression = match (&item.expr, scope) {
                (Expression::Aggregate(a), Scope::Grouped) => {
                    self.exprs.translate_aggregate(&item.expr, a, Some(&name))?
                }
                (Expression::Literal(v), _) => {
                    let value = self.exprs.marshaller.to_store_value(v)?;
                    self.exprs.wrap_literal(value)?
                }
                (e, scope) => self.exprs.translate(e, scope)?,
            };
            let ty = self.exprs.infer_type(&item.expr)?;
            let fingerprint = item.expr.pretty_print();
            self.exprs
                .registry
                .register(fingerprint.clone(), ColumnDetail::new(expression.clone()));
            self.exprs.registry.add_alias(&fingerprint, name.clone());

            // read directly from the group output when the final projection is skipped
            let path = match (scope, self.exprs.project_before_match) {
                (Scope::Grouped, true) => match &expression {
                    Bson::String(s) if s.starts_with('$') => s[1..].to_string(),
                    _ => name.clone(),
                },
                _ => name.clone(),
            };
            outputs.push(Output {
                column: OutputColumn { name, path, ty },
                expression,
            });
        }
        Ok(outputs)
    }

    fn translate_order_by(&mut self, select: &Select, outputs: &[Output]) -> Result<Vec<SortKey>> {
        let mut sort = vec![];
        for spec in &select.order_by {
            let fingerprint = spec.expr.pretty_print();
            let by_fingerprint = self
                .exprs
                .registry
                .get(&fingerprint)
                .and_then(|d| d.aliases.first().cloned());
            let by_alias = match &spec.expr {
                Expression::Column(c) if c.table.is_empty() => Some(c.column.clone()),
                _ => None,
            };
            let output = by_fingerprint
                .iter()
                .chain(by_alias.iter())
                .find_map(|name| outputs.iter().find(|o| o.column.name.eq_ignore_ascii_case(name)))
                .ok_or_else(|| Error::OrderByNotProjected(fingerprint.clone()))?;
            sort.push(SortKey {
                path: output.column.path.clone(),
                ascending: spec.ascending,
            });
        }
        Ok(sort)
    }

    /// The projection run before the match: helper fields, every stored
    /// field the query reads and, without grouping, the outputs themselves.
    fn pre_match_projection(&self, outputs: &[Output], grouped: bool) -> Result<Project> {
        let mut fields: Vec<(String, ProjectItem)> = self
            .exprs
            .helper_fields
            .iter()
            .map(|(name, e)| (name.clone(), ProjectItem::Expression(e.clone())))
            .collect();

        let mut included: Vec<String> = vec![];
        for path in self.exprs.registry.field_paths() {
            if included.iter().any(|p| covers(p, path)) {
                continue;
            }
            included.retain(|p| !covers(path, p));
            included.push(path.to_string());
        }

        if !grouped {
            for output in outputs {
                let name = &output.column.name;
                if included.iter().any(|p| p == name)
                    && output.expression == Bson::String(format!("${name}"))
                {
                    continue;
                }
                if included.iter().any(|p| covers(name, p) || covers(p, name)) {
                    return Err(Error::Unsupported(format!(
                        "output column '{name}' collides with a stored field"
                    )));
                }
                fields.push((name.clone(), ProjectItem::Expression(output.expression.clone())));
            }
        }
        fields.extend(included.into_iter().map(|p| (p, ProjectItem::Include)));
        Ok(Project {
            fields,
            exclude_id: false,
        })
    }
}

/// Whether including `outer` already includes `inner`.
fn covers(outer: &str, inner: &str) -> bool {
    inner == outer || inner.starts_with(&format!("{outer}."))
}

/// The alias, the column name made unique, or a positional name.
fn output_name(item: &DerivedColumn, index: usize, used: &mut BTreeSet<String>) -> String {
    let base = match (&item.alias, &item.expr) {
        (Some(alias), _) => {
            used.insert(alias.to_lowercase());
            return alias.clone();
        }
        (None, Expression::Column(c)) => c.column.clone(),
        (None, _) => format!("expr{}", index + 1),
    };
    let mut name = base.clone();
    let mut n = 0;
    while !used.insert(name.to_lowercase()) {
        n += 1;
        name = format!("{base}_{n}");
    }
    name
}
