use crate::{
    ast::{AggregateExpr, AggregateFunction, ColumnRef, ComparisonOp, Expression, PrettyPrint},
    document_map::DocumentMapContext,
    mapping_registry::{ColumnDetail, ColumnRegistry},
    marshal::Marshaller,
    options::TranslatorOptions,
    translator::{
        first_error,
        functions::{self, FunctionMapping},
        like_to_regex, Accumulator, AccumulatorFunction, Error, Result, Source,
    },
    types::{RelationalType, Value},
};
use bson::{bson, Bson};

/// Which values an expression may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    /// Fields of the source document.
    Raw,
    /// Grouping keys and accumulators, after `$group`.
    Grouped,
}

/// Where the translated expression runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Inside an aggregation pipeline, where computed predicates can be
    /// projected before the match.
    Pipeline,
    /// In the filter of a write, where computed predicates become `$expr`.
    Standalone,
    /// Relative to one element of a merged array, as in a `$pull` condition.
    Element,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ResolvedColumn {
    pub path: String,
    pub ty: RelationalType,
}

pub(crate) struct ExpressionTranslator<'a, 'c> {
    pub ctx: &'a mut DocumentMapContext<'c>,
    pub top: String,
    pub sources: Vec<Source>,
    pub marshaller: Marshaller<'a>,
    pub options: &'a TranslatorOptions,
    pub mode: Mode,
    pub registry: ColumnRegistry,
    pub project_before_match: bool,
    /// Computed predicates projected before the match, by field name.
    pub helper_fields: Vec<(String, Bson)>,
    pub accumulators: Vec<Accumulator>,
}

fn comparison_operator(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "$eq",
        ComparisonOp::Neq => "$ne",
        ComparisonOp::Lt => "$lt",
        ComparisonOp::Lte => "$lte",
        ComparisonOp::Gt => "$gt",
        ComparisonOp::Gte => "$gte",
    }
}

/// Whether `name` can be used as a top-level field of a stage.
pub(crate) fn is_plain_field(name: &str) -> bool {
    !name.is_empty() && name != "_id" && !name.starts_with('$') && !name.contains('.')
}

fn literal_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Byte(v) => Some(*v as i64),
        Value::Short(v) => Some(*v as i64),
        Value::Integer(v) => Some(*v as i64),
        Value::Long(v) => Some(*v),
        _ => None,
    }
}

impl<'a, 'c> ExpressionTranslator<'a, 'c> {
    pub fn new(
        ctx: &'a mut DocumentMapContext<'c>,
        top: String,
        sources: Vec<Source>,
        marshaller: Marshaller<'a>,
        options: &'a TranslatorOptions,
        mode: Mode,
    ) -> Self {
        Self {
            ctx,
            top,
            sources,
            marshaller,
            options,
            mode,
            registry: ColumnRegistry::new(),
            project_before_match: false,
            helper_fields: vec![],
            accumulators: vec![],
        }
    }

    fn source_for(&self, c: &ColumnRef) -> Result<usize> {
        if !c.table.is_empty() {
            return self
                .sources
                .iter()
                .position(|s| s.name.eq_ignore_ascii_case(&c.table))
                .ok_or_else(|| Error::UnknownSource(c.table.clone()));
        }
        let mut found = vec![];
        for (i, source) in self.sources.iter().enumerate() {
            if self.ctx.table(&source.table)?.get_column(&c.column).is_some() {
                found.push(i);
            }
        }
        match found.as_slice() {
            [i] => Ok(*i),
            [] => Err(Error::UnknownColumn(c.column.clone())),
            _ => Err(Error::AmbiguousColumn(c.column.clone())),
        }
    }

    /// Finds the stored field of a column and its declared type.
    pub fn resolve(&mut self, c: &ColumnRef) -> Result<ResolvedColumn> {
        let i = self.source_for(c)?;
        let source = &self.sources[i];
        let ty = self
            .ctx
            .table(&source.table)?
            .get_column(&c.column)
            .map(|col| col.ty.clone())
            .ok_or_else(|| Error::UnknownColumn(c.column.clone()))?;
        let location = self.ctx.locate_column(&self.top, &source.hops, &c.column)?;
        let path = match self.mode {
            Mode::Element if location.depth != source.hops.len() => {
                return Err(Error::NotElementLocal(c.column.clone()))
            }
            Mode::Element => location.field,
            Mode::Pipeline | Mode::Standalone => location.path(&source.hops),
        };
        Ok(ResolvedColumn { path, ty })
    }

    pub fn grouped_path(&self, expr: &Expression) -> Option<String> {
        self.registry
            .get(&expr.pretty_print())
            .and_then(|d| d.grouped_path.clone())
    }

    pub fn translate(&mut self, expr: &Expression, scope: Scope) -> Result<Bson> {
        if scope == Scope::Grouped {
            if let Some(path) = self.grouped_path(expr) {
                return Ok(Bson::String(format!("${path}")));
            }
        }
        match expr {
            Expression::Column(c) => match scope {
                Scope::Raw => {
                    let resolved = self.resolve(c)?;
                    let field = Bson::String(format!("${}", resolved.path));
                    self.registry
                        .register(expr.pretty_print(), ColumnDetail::new(field.clone()));
                    Ok(field)
                }
                Scope::Grouped => Err(Error::ColumnNotGrouped(expr.pretty_print())),
            },
            Expression::Literal(v) => self.translate_literal(v),
            Expression::Comparison(c) => {
                let op = comparison_operator(c.op);
                let args = self.translate_all([c.left.as_ref(), c.right.as_ref()], scope)?;
                Ok(bson!({ op: args }))
            }
            Expression::And(terms) => {
                let args = self.translate_all(terms, scope)?;
                Ok(bson!({ "$and": args }))
            }
            Expression::Or(terms) => {
                let args = self.translate_all(terms, scope)?;
                Ok(bson!({ "$or": args }))
            }
            Expression::Not(e) => {
                let arg = self.translate(e, scope)?;
                Ok(bson!({ "$not": [arg] }))
            }
            Expression::In(i) => {
                let input = self.translate(&i.expr, scope)?;
                let list = self.translate_all(&i.list, scope)?;
                let contained = bson!({ "$in": [input, list] });
                Ok(if i.negated {
                    bson!({ "$not": [contained] })
                } else {
                    contained
                })
            }
            Expression::IsNull(i) => {
                let input = self.translate(&i.expr, scope)?;
                let op = if i.negated { "$ne" } else { "$eq" };
                Ok(bson!({ op: [{ "$ifNull": [input, Bson::Null] }, Bson::Null] }))
            }
            Expression::Like(l) => {
                let pattern = like_pattern(&l.pattern)?;
                let input = self.translate(&l.expr, scope)?;
                let matched = bson!({ "$regexMatch": {
                    "input": input,
                    "regex": like_to_regex(&pattern, l.escape),
                    "options": "s",
                }});
                Ok(if l.negated {
                    bson!({ "$not": [matched] })
                } else {
                    matched
                })
            }
            Expression::Function(f) => {
                let mapping = functions::lookup(&f.name)?;
                let args = self.translate_all(&f.args, scope)?;
                let start_literal = match (mapping, f.args.get(1)) {
                    (FunctionMapping::Substring, Some(Expression::Literal(v))) => {
                        literal_integer(v)
                    }
                    _ => None,
                };
                functions::apply(
                    &f.name,
                    mapping,
                    args,
                    start_literal,
                    self.options.null_guard_date_functions,
                )
            }
            Expression::Aggregate(a) => match scope {
                Scope::Raw => Err(Error::AggregateNotAllowed(expr.pretty_print())),
                Scope::Grouped => self.translate_aggregate(expr, a, None),
            },
        }
    }

    fn translate_all<'e>(
        &mut self,
        exprs: impl IntoIterator<Item = &'e Expression>,
        scope: Scope,
    ) -> Result<Vec<Bson>> {
        let results = exprs
            .into_iter()
            .map(|e| self.translate(e, scope))
            .collect::<Vec<_>>();
        first_error(results)
    }

    pub fn translate_literal(&self, value: &Value) -> Result<Bson> {
        match self.marshaller.to_store_value(value)? {
            Bson::String(s) if s.starts_with('$') => self.wrap_literal(Bson::String(s)),
            other => Ok(other),
        }
    }

    /// Protects a constant from being read as a field path or an inclusion
    /// flag.
    pub fn wrap_literal(&self, value: Bson) -> Result<Bson> {
        if !self.options.supports_literal_expression {
            return Err(Error::Unsupported(format!(
                "the constant {value} cannot be expressed without $literal"
            )));
        }
        Ok(bson!({ "$literal": value }))
    }

    /// Adds an accumulator to the group stage, named after `name_hint` when it
    /// is usable, and returns a reference to its output.
    pub fn translate_aggregate(
        &mut self,
        expr: &Expression,
        aggregate: &AggregateExpr,
        name_hint: Option<&str>,
    ) -> Result<Bson> {
        if let Some(path) = self.grouped_path(expr) {
            return Ok(Bson::String(format!("${path}")));
        }
        if aggregate.distinct {
            return Err(Error::Unsupported(format!(
                "DISTINCT aggregate {}",
                expr.pretty_print()
            )));
        }
        let arg = match &aggregate.arg {
            Some(arg) => Some(self.translate(arg, Scope::Raw)?),
            None => None,
        };
        let (function, arg) = match (aggregate.function, arg) {
            (AggregateFunction::Count, None) => (AccumulatorFunction::Sum, Bson::Int32(1)),
            (AggregateFunction::Count, Some(arg)) => (
                AccumulatorFunction::Sum,
                bson!({ "$cond": [{ "$gt": [arg, Bson::Null] }, 1, 0] }),
            ),
            (AggregateFunction::Sum, Some(arg)) => (AccumulatorFunction::Sum, arg),
            (AggregateFunction::Avg, Some(arg)) => (AccumulatorFunction::Avg, arg),
            (AggregateFunction::Min, Some(arg)) => (AccumulatorFunction::Min, arg),
            (AggregateFunction::Max, Some(arg)) => (AccumulatorFunction::Max, arg),
            (_, None) => {
                return Err(Error::Unsupported(format!(
                    "{} without an argument",
                    expr.pretty_print()
                )))
            }
        };
        let name = match name_hint {
            Some(n) if is_plain_field(n) && !self.accumulators.iter().any(|a| a.name == n) => {
                n.to_string()
            }
            _ => format!("agg{}", self.accumulators.len()),
        };
        self.accumulators.push(Accumulator {
            name: name.clone(),
            function,
            arg,
        });
        let output = Bson::String(format!("${name}"));
        let detail = self.registry.register(
            expr.pretty_print(),
            ColumnDetail {
                field_path: None,
                ..ColumnDetail::new(output.clone())
            },
        );
        detail.grouped_path = Some(name);
        Ok(output)
    }

    /// The relational type a translated expression produces.
    pub fn infer_type(&mut self, expr: &Expression) -> Result<RelationalType> {
        Ok(match expr {
            Expression::Column(c) => self.resolve(c)?.ty,
            Expression::Literal(v) => v.relational_type().unwrap_or(RelationalType::String),
            Expression::Comparison(_)
            | Expression::And(_)
            | Expression::Or(_)
            | Expression::Not(_)
            | Expression::In(_)
            | Expression::IsNull(_)
            | Expression::Like(_) => RelationalType::Boolean,
            Expression::Function(f) => {
                let mapping = functions::lookup(&f.name)?;
                let arg_types = f
                    .args
                    .iter()
                    .map(|a| self.infer_type(a))
                    .collect::<Result<Vec<_>>>()?;
                functions::result_type(mapping, &arg_types)
            }
            Expression::Aggregate(a) => {
                let arg = match &a.arg {
                    Some(arg) => Some(self.infer_type(arg)?),
                    None => None,
                };
                match (a.function, arg) {
                    (AggregateFunction::Count, _) => RelationalType::Integer,
                    (AggregateFunction::Avg, _) => RelationalType::Double,
                    (AggregateFunction::Sum, Some(ty)) => match ty {
                        RelationalType::Byte | RelationalType::Short | RelationalType::Integer => {
                            RelationalType::Long
                        }
                        RelationalType::Float => RelationalType::Double,
                        other => other,
                    },
                    (_, Some(ty)) => ty,
                    (_, None) => RelationalType::Double,
                }
            }
        })
    }
}

/// The pattern of a LIKE, which must be a string literal.
pub(crate) fn like_pattern(pattern: &Expression) -> Result<String> {
    match pattern {
        Expression::Literal(Value::String(p)) => Ok(p.clone()),
        Expression::Literal(Value::Char(c)) => Ok(c.to_string()),
        other => Err(Error::Unsupported(format!(
            "LIKE with the non-literal pattern {}",
            other.pretty_print()
        ))),
    }
}
