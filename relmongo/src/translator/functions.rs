use crate::{
    translator::{Error, Result},
    types::RelationalType,
};
use bson::{bson, Bson};
use lazy_static::lazy_static;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FunctionMapping {
    /// `{op: [args...]}`
    Operator(&'static str),
    /// `{op: arg}`, guarded against null input when configured.
    DatePart(&'static str),
    /// `{op: {input: arg}}`
    Trim(&'static str),
    Substring,
}

lazy_static! {
    static ref FUNCTIONS: HashMap<&'static str, FunctionMapping> = {
        use FunctionMapping::*;
        let mut m = HashMap::new();
        for (names, mapping) in [
            (&["+", "add"][..], Operator("$add")),
            (&["-", "subtract"], Operator("$subtract")),
            (&["*", "multiply"], Operator("$multiply")),
            (&["/", "divide"], Operator("$divide")),
            (&["%", "mod"], Operator("$mod")),
            (&["||", "concat"], Operator("$concat")),
            (&["lcase", "lower"], Operator("$toLower")),
            (&["ucase", "upper"], Operator("$toUpper")),
            (&["length", "char_length"], Operator("$strLenCP")),
            (&["abs"], Operator("$abs")),
            (&["ceiling", "ceil"], Operator("$ceil")),
            (&["floor"], Operator("$floor")),
            (&["sqrt"], Operator("$sqrt")),
            (&["exp"], Operator("$exp")),
            (&["ln"], Operator("$ln")),
            (&["log10"], Operator("$log10")),
            (&["power"], Operator("$pow")),
            (&["round"], Operator("$round")),
            (&["ifnull", "nvl", "coalesce"], Operator("$ifNull")),
            (&["year"], DatePart("$year")),
            (&["month"], DatePart("$month")),
            (&["dayofmonth"], DatePart("$dayOfMonth")),
            (&["dayofweek"], DatePart("$dayOfWeek")),
            (&["dayofyear"], DatePart("$dayOfYear")),
            (&["week"], DatePart("$week")),
            (&["hour"], DatePart("$hour")),
            (&["minute"], DatePart("$minute")),
            (&["second"], DatePart("$second")),
            (&["trim"], Trim("$trim")),
            (&["ltrim"], Trim("$ltrim")),
            (&["rtrim"], Trim("$rtrim")),
            (&["substring", "substr"], Substring),
        ] {
            for name in names {
                m.insert(*name, mapping);
            }
        }
        m
    };
}

pub(crate) fn lookup(name: &str) -> Result<FunctionMapping> {
    FUNCTIONS
        .get(name.to_lowercase().as_str())
        .copied()
        .ok_or_else(|| Error::UnsupportedFunction(name.to_string()))
}

/// Builds the store expression for a scalar function over already-translated
/// arguments. `start_literal` is the SUBSTRING start position when it was
/// given as a literal.
pub(crate) fn apply(
    name: &str,
    mapping: FunctionMapping,
    mut args: Vec<Bson>,
    start_literal: Option<i64>,
    null_guard: bool,
) -> Result<Bson> {
    let arity = |expected: std::ops::RangeInclusive<usize>, args: &[Bson]| {
        if expected.contains(&args.len()) {
            Ok(())
        } else {
            Err(Error::FunctionArity(name.to_string(), args.len()))
        }
    };
    Ok(match mapping {
        FunctionMapping::Operator(op) => bson!({ op: args }),
        FunctionMapping::DatePart(op) => {
            arity(1..=1, &args)?;
            let arg = args.remove(0);
            if null_guard {
                bson!({"$cond": [
                    {"$eq": [{"$ifNull": [arg.clone(), Bson::Null]}, Bson::Null]},
                    Bson::Null,
                    { op: arg },
                ]})
            } else {
                bson!({ op: arg })
            }
        }
        FunctionMapping::Trim(op) => {
            arity(1..=1, &args)?;
            bson!({ op: { "input": args.remove(0) } })
        }
        FunctionMapping::Substring => {
            arity(2..=3, &args)?;
            let length = if args.len() == 3 {
                args.remove(2)
            } else {
                Bson::Int32(-1)
            };
            let start = match start_literal {
                Some(start) => Bson::Int64(start.saturating_sub(1)),
                None => bson!({"$subtract": [args[1].clone(), 1]}),
            };
            bson!({"$substr": [args.remove(0), start, length]})
        }
    })
}

/// The relational type a function produces for arguments of `args` types.
pub(crate) fn result_type(mapping: FunctionMapping, args: &[RelationalType]) -> RelationalType {
    let first = || args.first().cloned().unwrap_or(RelationalType::Double);
    match mapping {
        FunctionMapping::Operator("$add" | "$subtract" | "$multiply" | "$mod") => {
            if args
                .iter()
                .any(|t| matches!(t, RelationalType::Float | RelationalType::Double | RelationalType::BigDecimal))
            {
                RelationalType::Double
            } else {
                RelationalType::Long
            }
        }
        FunctionMapping::Operator("$divide" | "$sqrt" | "$exp" | "$ln" | "$log10" | "$pow") => {
            RelationalType::Double
        }
        FunctionMapping::Operator("$concat" | "$toLower" | "$toUpper")
        | FunctionMapping::Trim(_)
        | FunctionMapping::Substring => RelationalType::String,
        FunctionMapping::Operator("$strLenCP") | FunctionMapping::DatePart(_) => {
            RelationalType::Integer
        }
        FunctionMapping::Operator(_) => first(),
    }
}
