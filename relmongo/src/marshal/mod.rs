//! Conversion between relational values and the store's BSON representation.

use crate::{
    store::{self, LargeObjectStore},
    types::{RelationalType, Value},
};
use bson::{spec::BinarySubtype, Binary, Bson, Document};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;


pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("cannot convert {value} to {target}")]
    Conversion { value: String, target: RelationalType },
    #[error("'{0}' is not a valid decimal")]
    InvalidDecimal(String),
    #[error("large object is not valid UTF-8 text")]
    InvalidText,
    #[error("datetime {0} is out of range")]
    DateOutOfRange(i64),
    #[error("expected {expected} key values, found {actual}")]
    KeyShape { expected: usize, actual: usize },
    #[error("large object store error: {0}")]
    LargeObject(#[from] store::Error),
}

fn conversion_error(value: &Bson, target: &RelationalType) -> Error {
    Error::Conversion {
        value: value.to_string(),
        target: target.clone(),
    }
}

/// Converts values in both directions. The large-object store is only
/// touched for BLOB, CLOB and XML values.
#[derive(Clone, Copy)]
pub struct Marshaller<'a> {
    large_objects: &'a dyn LargeObjectStore,
}

impl<'a> Marshaller<'a> {
    pub fn new(large_objects: &'a dyn LargeObjectStore) -> Self {
        Self { large_objects }
    }

    pub fn to_store_value(&self, value: &Value) -> Result<Bson> {
        Ok(match value {
            Value::Null => Bson::Null,
            Value::Boolean(b) => Bson::Boolean(*b),
            Value::Byte(v) => Bson::Int32(*v as i32),
            Value::Short(v) => Bson::Int32(*v as i32),
            Value::Integer(v) => Bson::Int32(*v),
            Value::Long(v) => Bson::Int64(*v),
            Value::Float(v) => Bson::Double(*v as f64),
            Value::Double(v) => Bson::Double(*v),
            Value::BigInteger(v) => Bson::Double(*v as f64),
            Value::BigDecimal(v) => Bson::Double(
                v.parse()
                    .map_err(|_| Error::InvalidDecimal(v.to_string()))?,
            ),
            Value::Char(c) => Bson::String(c.to_string()),
            Value::String(s) => Bson::String(s.clone()),
            Value::Date(d) => Bson::DateTime(date_time(d.and_time(NaiveTime::MIN))),
            Value::Time(t) => Bson::DateTime(date_time(NaiveDate::default().and_time(*t))),
            Value::Timestamp(ts) => Bson::DateTime(date_time(*ts)),
            Value::Varbinary(bytes) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: bytes.clone(),
            }),
            Value::Blob(bytes) => Bson::String(self.store_large_object(bytes.clone())?),
            Value::Clob(s) | Value::Xml(s) => {
                Bson::String(self.store_large_object(s.as_bytes().to_vec())?)
            }
            Value::Array(values) => Bson::Array(
                values
                    .iter()
                    .map(|v| self.to_store_value(v))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    fn store_large_object(&self, content: Vec<u8>) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.large_objects.put(&id, content)?;
        Ok(id)
    }

    pub fn from_store_value(&self, value: &Bson, expected: &RelationalType) -> Result<Value> {
        self.from_reference(value, None, expected)
    }

    /// Like `from_store_value`, but a reference whose identifier is itself a
    /// document is indexed by `field`.
    pub fn from_reference(
        &self,
        value: &Bson,
        field: Option<&str>,
        expected: &RelationalType,
    ) -> Result<Value> {
        if let Bson::Document(d) = value {
            if let Some(id) = dereference(d) {
                return match (id, field) {
                    (Bson::Document(key), Some(field)) => match key.get(field) {
                        Some(v) => self.convert(v, expected),
                        None => Ok(Value::Null),
                    },
                    (id, _) => self.convert(id, expected),
                };
            }
        }
        self.convert(value, expected)
    }

    fn convert(&self, value: &Bson, expected: &RelationalType) -> Result<Value> {
        use RelationalType as T;
        if matches!(value, Bson::Null | Bson::Undefined) {
            return Ok(Value::Null);
        }
        Ok(match (expected, value) {
            (T::Array(component), Bson::Array(values)) => Value::Array(
                values
                    .iter()
                    .map(|v| self.from_store_value(v, component))
                    .collect::<Result<Vec<_>>>()?,
            ),
            (T::Blob, Bson::String(id)) => Value::Blob(self.large_objects.get(id)?),
            (T::Blob, Bson::Binary(b)) => Value::Blob(b.bytes.clone()),
            (T::Clob, Bson::String(id)) => Value::Clob(self.large_text(id)?),
            (T::Xml, Bson::String(id)) => Value::Xml(self.large_text(id)?),
            (T::Varbinary, Bson::Binary(b)) => Value::Varbinary(b.bytes.clone()),
            (T::Date, Bson::DateTime(dt)) => Value::Date(naive_date_time(dt)?.date()),
            (T::Time, Bson::DateTime(dt)) => Value::Time(naive_date_time(dt)?.time()),
            (T::Timestamp, Bson::DateTime(dt)) => Value::Timestamp(naive_date_time(dt)?),
            (T::Char, Bson::String(s)) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(conversion_error(value, expected)),
                }
            }
            (T::String, Bson::String(s)) => Value::String(s.clone()),
            (T::Boolean, Bson::Boolean(b)) => Value::Boolean(*b),
            _ => return coerce(value, expected),
        })
    }

    fn large_text(&self, id: &str) -> Result<String> {
        String::from_utf8(self.large_objects.get(id)?).map_err(|_| Error::InvalidText)
    }

    /// The `_id` value for a key made of `columns`: the value itself when the key
    /// has one column, a sub-document with one field per column otherwise.
    pub fn key_value(&self, columns: &[String], values: &[Value]) -> Result<Bson> {
        if columns.len() != values.len() {
            return Err(Error::KeyShape {
                expected: columns.len(),
                actual: values.len(),
            });
        }
        let bson = values
            .iter()
            .map(|v| self.to_store_value(v))
            .collect::<Result<Vec<_>>>()?;
        Ok(key_from_parts(columns, bson))
    }
}

/// Builds a scalar or compound key from already-marshalled parts.
pub fn key_from_parts(columns: &[String], mut parts: Vec<Bson>) -> Bson {
    if parts.len() == 1 {
        return parts.remove(0);
    }
    Bson::Document(columns.iter().cloned().zip(parts).collect::<Document>())
}

/// Splits a stored key back into one value per key column.
pub fn key_values(key: &Bson, columns: &[String]) -> Result<Vec<Bson>> {
    match (key, columns.len()) {
        (Bson::Document(d), n) if n > 1 => columns
            .iter()
            .map(|c| {
                d.get(c).cloned().ok_or(Error::KeyShape {
                    expected: n,
                    actual: d.len(),
                })
            })
            .collect(),
        (_, 1) => Ok(vec![key.clone()]),
        (_, n) => Err(Error::KeyShape {
            expected: n,
            actual: 1,
        }),
    }
}

fn dereference(d: &Document) -> Option<&Bson> {
    if d.contains_key("$ref") {
        d.get("$id")
    } else {
        None
    }
}

fn date_time(ts: NaiveDateTime) -> bson::DateTime {
    bson::DateTime::from_millis(ts.and_utc().timestamp_millis())
}

fn naive_date_time(dt: &bson::DateTime) -> Result<NaiveDateTime> {
    let millis = dt.timestamp_millis();
    DateTime::from_timestamp_millis(millis)
        .map(|d| d.naive_utc())
        .ok_or(Error::DateOutOfRange(millis))
}

/// The generic fallback: numeric widening and narrowing, numeric and boolean
/// text parsing, boolean to and from numbers.
fn coerce(value: &Bson, expected: &RelationalType) -> Result<Value> {
    use RelationalType as T;
    let err = || conversion_error(value, expected);
    let as_f64 = match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        Bson::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Bson::String(s) if expected.is_numeric() => Some(s.trim().parse::<f64>().map_err(|_| err())?),
        _ => None,
    };
    let as_i64 = match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        Bson::Boolean(b) => Some(*b as i64),
        Bson::String(s) => s.trim().parse::<i64>().ok(),
        Bson::Double(v) if v.fract() == 0.0 => Some(*v as i64),
        _ => None,
    };
    Ok(match expected {
        T::Byte => Value::Byte(as_i64.and_then(|v| i8::try_from(v).ok()).ok_or_else(err)?),
        T::Short => Value::Short(as_i64.and_then(|v| i16::try_from(v).ok()).ok_or_else(err)?),
        T::Integer => Value::Integer(as_i64.and_then(|v| i32::try_from(v).ok()).ok_or_else(err)?),
        T::Long => Value::Long(as_i64.ok_or_else(err)?),
        T::BigInteger => Value::BigInteger(
            as_i64
                .map(i128::from)
                .or_else(|| as_f64.filter(|f| f.fract() == 0.0).map(|f| f as i128))
                .ok_or_else(err)?,
        ),
        T::Float => Value::Float(as_f64.ok_or_else(err)? as f32),
        T::Double => Value::Double(as_f64.ok_or_else(err)?),
        T::BigDecimal => Value::BigDecimal(as_f64.ok_or_else(err)?.to_string()),
        T::Boolean => Value::Boolean(match value {
            Bson::String(s) if s.eq_ignore_ascii_case("true") => true,
            Bson::String(s) if s.eq_ignore_ascii_case("false") => false,
            _ => as_f64.ok_or_else(err)? != 0.0,
        }),
        T::String | T::Clob => {
            let text = match value {
                Bson::Int32(v) => v.to_string(),
                Bson::Int64(v) => v.to_string(),
                Bson::Double(v) => v.to_string(),
                Bson::Boolean(b) => b.to_string(),
                Bson::ObjectId(oid) => oid.to_hex(),
                Bson::String(s) => s.clone(),
                _ => return Err(err()),
            };
            if *expected == T::String {
                Value::String(text)
            } else {
                Value::Clob(text)
            }
        }
        T::Char
        | T::Date
        | T::Time
        | T::Timestamp
        | T::Varbinary
        | T::Blob
        | T::Xml
        | T::Array(_) => return Err(err()),
    })
}
