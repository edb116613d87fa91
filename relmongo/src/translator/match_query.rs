use crate::{
    ast::{ComparisonOp, Expression, LikeExpr, PrettyPrint},
    translator::{
        expressions::like_pattern, first_error, Error, ExpressionTranslator, MatchComparison,
        MatchComparisonOp, MatchIn, MatchQuery, MatchRegex, Mode, Result, Scope,
    },
};
use bson::Bson;

fn match_operator(op: ComparisonOp) -> MatchComparisonOp {
    match op {
        ComparisonOp::Eq => MatchComparisonOp::Eq,
        ComparisonOp::Neq => MatchComparisonOp::Ne,
        ComparisonOp::Lt => MatchComparisonOp::Lt,
        ComparisonOp::Lte => MatchComparisonOp::Lte,
        ComparisonOp::Gt => MatchComparisonOp::Gt,
        ComparisonOp::Gte => MatchComparisonOp::Gte,
    }
}

enum LikeToken {
    Any,
    One,
    Char(char),
}

/// Compiles a LIKE pattern into a regular expression. `%` matches any run of
/// characters and `_` exactly one; the expression is anchored at each end
/// the pattern does not leave open with `%`.
pub(crate) fn like_to_regex(pattern: &str, escape: Option<char>) -> String {
    let mut tokens = vec![];
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            c if Some(c) == escape => {
                if let Some(escaped) = chars.next() {
                    tokens.push(LikeToken::Char(escaped));
                }
            }
            '%' => tokens.push(LikeToken::Any),
            '_' => tokens.push(LikeToken::One),
            c => tokens.push(LikeToken::Char(c)),
        }
    }
    let open_start = matches!(tokens.first(), Some(LikeToken::Any));
    if open_start {
        tokens.remove(0);
    }
    let open_end = matches!(tokens.last(), Some(LikeToken::Any));
    if open_end {
        tokens.pop();
    }

    let mut regex = String::new();
    if !open_start {
        regex.push('^');
    }
    for token in tokens {
        match token {
            LikeToken::Any => regex.push_str(".*"),
            LikeToken::One => regex.push('.'),
            LikeToken::Char(c) => regex.push_str(&regex::escape(&c.to_string())),
        }
    }
    if !open_end && !(open_start && regex.is_empty()) {
        regex.push('$');
    }
    regex
}

impl<'a, 'c> ExpressionTranslator<'a, 'c> {
    /// Translates a predicate into the match language, using direct field
    /// conditions wherever an operand is a stored (or, after grouping, an
    /// output) field compared against constants.
    pub fn translate_filter(&mut self, expr: &Expression, scope: Scope) -> Result<MatchQuery> {
        match expr {
            Expression::And(terms) => Ok(MatchQuery::And(self.translate_filters(terms, scope)?)),
            Expression::Or(terms) => Ok(MatchQuery::Or(self.translate_filters(terms, scope)?)),
            Expression::Not(inner) => match inner.as_ref() {
                Expression::Not(e) => self.translate_filter(e, scope),
                e => Ok(self.translate_filter(e, scope)?.negate()),
            },
            Expression::Comparison(c) => {
                if let (Some(input), Some(arg)) =
                    (self.field_of(&c.left, scope)?, self.match_literal(&c.right)?)
                {
                    return Ok(MatchQuery::Comparison(MatchComparison {
                        input: Some(input),
                        op: match_operator(c.op),
                        arg,
                    }));
                }
                if let (Some(arg), Some(input)) =
                    (self.match_literal(&c.left)?, self.field_of(&c.right, scope)?)
                {
                    return Ok(MatchQuery::Comparison(MatchComparison {
                        input: Some(input),
                        op: match_operator(c.op.flip()),
                        arg,
                    }));
                }
                self.computed_filter(expr, scope)
            }
            Expression::In(i) => {
                let literals = i
                    .list
                    .iter()
                    .map(|e| self.match_literal(e))
                    .collect::<Result<Option<Vec<_>>>>()?;
                match (self.field_of(&i.expr, scope)?, literals) {
                    (Some(input), Some(args)) => Ok(MatchQuery::In(MatchIn {
                        input: Some(input),
                        args,
                        negated: i.negated,
                    })),
                    _ => self.computed_filter(expr, scope),
                }
            }
            Expression::IsNull(i) => match self.field_of(&i.expr, scope)? {
                Some(input) => Ok(MatchQuery::Comparison(MatchComparison {
                    input: Some(input),
                    op: if i.negated {
                        MatchComparisonOp::Ne
                    } else {
                        MatchComparisonOp::Eq
                    },
                    arg: Bson::Null,
                })),
                None => self.computed_filter(expr, scope),
            },
            Expression::Like(l) => self.translate_like_filter(expr, l, scope),
            Expression::Column(_) => match self.field_of(expr, scope)? {
                Some(input) => Ok(MatchQuery::Comparison(MatchComparison {
                    input: Some(input),
                    op: MatchComparisonOp::Eq,
                    arg: Bson::Boolean(true),
                })),
                None => self.computed_filter(expr, scope),
            },
            Expression::Literal(_) | Expression::Function(_) | Expression::Aggregate(_) => {
                self.computed_filter(expr, scope)
            }
        }
    }

    fn translate_filters(&mut self, terms: &[Expression], scope: Scope) -> Result<Vec<MatchQuery>> {
        let results = terms
            .iter()
            .map(|t| self.translate_filter(t, scope))
            .collect::<Vec<_>>();
        first_error(results)
    }

    fn translate_like_filter(
        &mut self,
        expr: &Expression,
        like: &LikeExpr,
        scope: Scope,
    ) -> Result<MatchQuery> {
        let pattern = like_pattern(&like.pattern)?;
        if let Expression::Column(c) = like.expr.as_ref() {
            let resolved = self.resolve(c)?;
            if !resolved.ty.is_string() {
                return Err(Error::Unsupported(format!(
                    "LIKE on the {} column {}",
                    resolved.ty,
                    like.expr.pretty_print()
                )));
            }
        }
        match self.field_of(&like.expr, scope)? {
            Some(input) => Ok(MatchQuery::Regex(MatchRegex {
                input: Some(input),
                regex: like_to_regex(&pattern, like.escape),
                options: "s".to_string(),
                negated: like.negated,
            })),
            None => self.computed_filter(expr, scope),
        }
    }

    /// The field a match condition can test for `expr`, if there is one.
    fn field_of(&mut self, expr: &Expression, scope: Scope) -> Result<Option<String>> {
        match (expr, scope) {
            (Expression::Column(_), Scope::Raw) => match self.translate(expr, scope)? {
                Bson::String(s) => Ok(Some(s[1..].to_string())),
                _ => Ok(None),
            },
            (Expression::Aggregate(a), Scope::Grouped) => {
                self.translate_aggregate(expr, a, None)?;
                Ok(self.grouped_path(expr))
            }
            (_, Scope::Grouped) => Ok(self.grouped_path(expr)),
            _ => Ok(None),
        }
    }

    fn match_literal(&self, expr: &Expression) -> Result<Option<Bson>> {
        match expr {
            Expression::Literal(v) => Ok(Some(self.marshaller.to_store_value(v)?)),
            _ => Ok(None),
        }
    }

    /// A predicate over computed values. In a pipeline it is evaluated into a
    /// helper field projected before the match.
    fn computed_filter(&mut self, expr: &Expression, scope: Scope) -> Result<MatchQuery> {
        match (scope, self.mode) {
            (Scope::Grouped, _) | (Scope::Raw, Mode::Standalone) => {
                Ok(MatchQuery::Expr(self.translate(expr, scope)?))
            }
            (Scope::Raw, Mode::Pipeline) => {
                let computed = self.translate(expr, scope)?;
                let name = format!("__m{}", self.helper_fields.len());
                self.helper_fields.push((name.clone(), computed));
                self.project_before_match = true;
                Ok(MatchQuery::Comparison(MatchComparison {
                    input: Some(name),
                    op: MatchComparisonOp::Eq,
                    arg: Bson::Boolean(true),
                }))
            }
            (Scope::Raw, Mode::Element) => Err(Error::NotElementLocal(expr.pretty_print())),
        }
    }
}
