use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};


/// The relational type system exposed to the query engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationalType {
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
    Char,
    String,
    Date,
    Time,
    Timestamp,
    Varbinary,
    Blob,
    Clob,
    Xml,
    Array(Box<RelationalType>),
}

impl RelationalType {
    pub fn is_numeric(&self) -> bool {
        use RelationalType::*;
        matches!(
            self,
            Byte | Short | Integer | Long | Float | Double | BigInteger | BigDecimal
        )
    }

    pub fn is_string(&self) -> bool {
        use RelationalType::*;
        matches!(self, Char | String | Clob | Xml)
    }

    pub fn is_temporal(&self) -> bool {
        use RelationalType::*;
        matches!(self, Date | Time | Timestamp)
    }

    pub fn is_large_object(&self) -> bool {
        use RelationalType::*;
        matches!(self, Blob | Clob | Xml)
    }
}

impl fmt::Display for RelationalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use RelationalType::*;
        match self {
            Boolean => write!(f, "BOOLEAN"),
            Byte => write!(f, "BYTE"),
            Short => write!(f, "SHORT"),
            Integer => write!(f, "INTEGER"),
            Long => write!(f, "LONG"),
            Float => write!(f, "FLOAT"),
            Double => write!(f, "DOUBLE"),
            BigInteger => write!(f, "BIGINTEGER"),
            BigDecimal => write!(f, "BIGDECIMAL"),
            Char => write!(f, "CHAR"),
            String => write!(f, "STRING"),
            Date => write!(f, "DATE"),
            Time => write!(f, "TIME"),
            Timestamp => write!(f, "TIMESTAMP"),
            Varbinary => write!(f, "VARBINARY"),
            Blob => write!(f, "BLOB"),
            Clob => write!(f, "CLOB"),
            Xml => write!(f, "XML"),
            Array(component) => write!(f, "{component}[]"),
        }
    }
}

/// A relational value as produced or consumed by the query engine.
///
/// Large decimals are carried in their canonical textual form; the store only
/// ever sees them as doubles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInteger(i128),
    BigDecimal(String),
    Char(char),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Varbinary(Vec<u8>),
    Blob(Vec<u8>),
    Clob(String),
    Xml(String),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the relational type of this value, or None for NULL and for
    /// arrays whose component type cannot be determined.
    pub fn relational_type(&self) -> Option<RelationalType> {
        use Value::*;
        Some(match self {
            Null => return None,
            Boolean(_) => RelationalType::Boolean,
            Byte(_) => RelationalType::Byte,
            Short(_) => RelationalType::Short,
            Integer(_) => RelationalType::Integer,
            Long(_) => RelationalType::Long,
            Float(_) => RelationalType::Float,
            Double(_) => RelationalType::Double,
            BigInteger(_) => RelationalType::BigInteger,
            BigDecimal(_) => RelationalType::BigDecimal,
            Char(_) => RelationalType::Char,
            String(_) => RelationalType::String,
            Date(_) => RelationalType::Date,
            Time(_) => RelationalType::Time,
            Timestamp(_) => RelationalType::Timestamp,
            Varbinary(_) => RelationalType::Varbinary,
            Blob(_) => RelationalType::Blob,
            Clob(_) => RelationalType::Clob,
            Xml(_) => RelationalType::Xml,
            Array(values) => RelationalType::Array(Box::new(
                values.iter().find_map(Value::relational_type)?,
            )),
        })
    }

    /// The value as a double, for any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        use Value::*;
        match self {
            Byte(v) => Some(*v as f64),
            Short(v) => Some(*v as f64),
            Integer(v) => Some(*v as f64),
            Long(v) => Some(*v as f64),
            Float(v) => Some(*v as f64),
            Double(v) => Some(*v),
            BigInteger(v) => Some(*v as f64),
            BigDecimal(v) => v.parse().ok(),
            _ => None,
        }
    }

    /// The value as text, for any character variant.
    pub fn as_text(&self) -> Option<String> {
        use Value::*;
        match self {
            Char(c) => Some(c.to_string()),
            String(s) | Clob(s) | Xml(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Compares two non-null values the way a relational engine would: numerics
    /// across widths, character data across char/string, temporal values of the
    /// same kind. Incomparable pairs (and NULLs) yield None.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        use Value::*;
        if self.is_null() || other.is_null() {
            return None;
        }
        if let (Some(l), Some(r)) = (self.as_f64(), other.as_f64()) {
            return l.partial_cmp(&r);
        }
        if let (Some(l), Some(r)) = (self.as_text(), other.as_text()) {
            return Some(l.cmp(&r));
        }
        match (self, other) {
            (Boolean(l), Boolean(r)) => Some(l.cmp(r)),
            (Date(l), Date(r)) => Some(l.cmp(r)),
            (Time(l), Time(r)) => Some(l.cmp(r)),
            (Timestamp(l), Timestamp(r)) => Some(l.cmp(r)),
            (Date(l), Timestamp(r)) => Some(l.and_time(NaiveTime::MIN).cmp(r)),
            (Timestamp(l), Date(r)) => Some(l.cmp(&r.and_time(NaiveTime::MIN))),
            (Varbinary(l) | Blob(l), Varbinary(r) | Blob(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Value::*;
        match self {
            Null => write!(f, "NULL"),
            Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Byte(v) => write!(f, "{v}"),
            Short(v) => write!(f, "{v}"),
            Integer(v) => write!(f, "{v}"),
            Long(v) => write!(f, "{v}"),
            Float(v) => write!(f, "{v:?}"),
            Double(v) => write!(f, "{v:?}"),
            BigInteger(v) => write!(f, "{v}"),
            BigDecimal(v) => write!(f, "{v}"),
            Char(c) => write!(f, "'{}'", c.to_string().replace('\'', "''")),
            String(s) | Clob(s) | Xml(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Date(d) => write!(f, "DATE '{d}'"),
            Time(t) => write!(f, "TIME '{t}'"),
            Timestamp(ts) => write!(f, "TIMESTAMP '{ts}'"),
            Varbinary(bytes) | Blob(bytes) => {
                write!(f, "X'")?;
                for b in bytes {
                    write!(f, "{b:02X}")?;
                }
                write!(f, "'")
            }
            Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}
