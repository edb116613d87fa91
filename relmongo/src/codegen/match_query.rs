use crate::{
    codegen::MqlCodeGenerator,
    translator::{ElemMatch, MatchComparison, MatchComparisonOp, MatchIn, MatchQuery, MatchRegex},
};
use bson::{doc, Bson, Document};

/// Conditions under `$elemMatch` or `$pull` test the element itself and so
/// carry no input field.
macro_rules! possibly_nest_under_field {
    ($input:expr, $op:expr) => {
        match $input {
            None => $op,
            Some(field) => doc! { field: $op },
        }
    };
}

impl MqlCodeGenerator {
    pub fn codegen_match_query(&self, q: MatchQuery) -> Document {
        use MatchQuery::*;
        match q {
            And(mut v) if v.len() == 1 => self.codegen_match_query(v.remove(0)),
            Or(mut v) if v.len() == 1 => self.codegen_match_query(v.remove(0)),
            And(v) => self.codegen_match_logical_operator("$and", v),
            Or(v) => self.codegen_match_logical_operator("$or", v),
            Nor(v) => self.codegen_match_logical_operator("$nor", v),
            Comparison(c) => self.codegen_match_comparison(c),
            In(i) => self.codegen_match_in(i),
            Regex(r) => self.codegen_match_regex(r),
            ElemMatch(em) => self.codegen_match_elem_match(em),
            Expr(e) => doc! { "$expr": e },
        }
    }

    fn codegen_match_logical_operator(&self, op_name: &str, args: Vec<MatchQuery>) -> Document {
        let args = args
            .into_iter()
            .map(|arg| Bson::Document(self.codegen_match_query(arg)))
            .collect::<Vec<_>>();
        doc! { op_name: Bson::Array(args) }
    }

    /// `$ne`, `$nin` and `$not` also match a null or missing field, which a
    /// SQL comparison with NULL never does, so the negated forms exclude it.
    fn codegen_match_comparison(&self, c: MatchComparison) -> Document {
        use MatchComparisonOp::*;
        if c.op == Ne && c.arg != Bson::Null {
            let op = doc! { "$nin": [c.arg, Bson::Null] };
            return possibly_nest_under_field!(c.input, op);
        }
        let comp_op = match c.op {
            Lt => "$lt",
            Lte => "$lte",
            Ne => "$ne",
            Eq => "$eq",
            Gt => "$gt",
            Gte => "$gte",
        };
        let op = doc! { comp_op: c.arg };
        possibly_nest_under_field!(c.input, op)
    }

    fn codegen_match_in(&self, i: MatchIn) -> Document {
        let op = if i.negated {
            let mut args = i.args;
            if !args.contains(&Bson::Null) {
                args.push(Bson::Null);
            }
            doc! { "$nin": args }
        } else {
            doc! { "$in": i.args }
        };
        possibly_nest_under_field!(i.input, op)
    }

    fn codegen_match_regex(&self, r: MatchRegex) -> Document {
        let regex = doc! { "$regex": r.regex, "$options": r.options };
        let op = if r.negated {
            doc! { "$not": regex, "$ne": Bson::Null }
        } else {
            regex
        };
        possibly_nest_under_field!(r.input, op)
    }

    fn codegen_match_elem_match(&self, em: ElemMatch) -> Document {
        let condition = self.codegen_match_query(*em.condition);
        doc! { em.input: { "$elemMatch": condition } }
    }
}
