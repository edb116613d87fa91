//! Reading relational rows back out of result documents.

use crate::{
    marshal::{Marshaller, Result},
    translator::OutputColumn,
    types::Value,
};
use bson::{Bson, Document};

#[cfg(test)]
mod test;

/// Follows a dotted path through nested documents. Array elements are
/// addressed by their index.
pub fn get_path<'d>(document: &'d Document, path: &str) -> Option<&'d Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(d) => d.get(segment)?,
            Bson::Array(a) => a.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// One value per output column; a missing field reads as NULL.
pub fn decode_row(
    columns: &[OutputColumn],
    document: &Document,
    marshaller: &Marshaller,
) -> Result<Vec<Value>> {
    columns
        .iter()
        .map(|c| match get_path(document, &c.path) {
            Some(value) => marshaller.from_store_value(value, &c.ty),
            None => Ok(Value::Null),
        })
        .collect()
}
