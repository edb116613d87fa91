use crate::{
    document_map::{DocumentMap, DocumentMapContext, Hop},
    store::{MutationRequest, UpdateRequest},
    write::{Error, Result},
};
use bson::{Bson, Document};

/// Where a new row of a merged table goes: the filter finding the top-level
/// document, the positional path of the parent row, and the array filters
/// binding the path's identifiers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParentLocator {
    pub filter: Document,
    pub path: String,
    pub array_filters: Vec<Document>,
}

/// Index of the last array hop above `depth`.
fn enclosing_array(hops: &[Hop], depth: usize) -> Option<usize> {
    hops[..depth].iter().rposition(Hop::is_array)
}

/// The path of `field` relative to an element of the array reached by
/// `hops[..=array]`.
fn element_relative(hops: &[Hop], array: usize, depth: usize, field: &str) -> String {
    hops[array + 1..depth]
        .iter()
        .map(|h| h.field())
        .chain(std::iter::once(field))
        .collect::<Vec<_>>()
        .join(".")
}

/// Locates the row reached by `hops` whose key columns hold `key`. Every array
/// on the way is bound to an identifier `a<i>` when some key column pins it
/// down, and updated through `$[]` otherwise.
pub(crate) fn locate_parent(
    ctx: &mut DocumentMapContext,
    top: &str,
    hops: &[Hop],
    key: &[(String, Bson)],
) -> Result<ParentLocator> {
    let mut filter = Document::new();
    let mut conditions: Vec<Document> = vec![Document::new(); hops.len()];
    for (column, value) in key {
        let location = ctx.locate_column(top, hops, column)?;
        filter.insert(location.path(hops), value.clone());
        if let Some(array) = enclosing_array(hops, location.depth) {
            let field = element_relative(hops, array, location.depth, &location.field);
            conditions[array].insert(format!("a{array}.{field}"), value.clone());
        }
    }
    let mut segments = vec![];
    for (i, hop) in hops.iter().enumerate() {
        segments.push(hop.field().to_string());
        if hop.is_array() {
            segments.push(if conditions[i].is_empty() {
                "$[]".to_string()
            } else {
                format!("$[a{i}]")
            });
        }
    }
    Ok(ParentLocator {
        filter,
        path: segments.join("."),
        array_filters: conditions.into_iter().filter(|c| !c.is_empty()).collect(),
    })
}

/// The path addressing the held rows through every enclosing array, as used
/// by `$pull`: `orders.$[].lineitem`.
pub(crate) fn all_positions_path(hops: &[Hop]) -> String {
    let mut segments = vec![];
    for (i, hop) in hops.iter().enumerate() {
        segments.push(hop.field().to_string());
        if hop.is_array() && i + 1 < hops.len() {
            segments.push("$[]".to_string());
        }
    }
    segments.join(".")
}

/// What happens to the copies of a changed embeddable row.
#[derive(Debug, Clone, PartialEq)]
pub enum CopyChange {
    /// New values by column; NULL clears the field.
    Set(Vec<(String, Bson)>),
    /// The row is gone and so are its copies.
    Unset,
}

/// Patches the copies of one embeddable row held by one referencing table.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyPatch {
    pub collection: String,
    /// Paths of the referencing columns, in the embeddable key's column order.
    pub key_paths: Vec<String>,
    /// Positional path of the copy.
    pub copy_path: String,
    /// The identifier bound in `copy_path` and the element-relative paths of
    /// the referencing columns, when the copies sit inside an array.
    pub array_filter: Option<(String, Vec<String>)>,
    pub change: CopyChange,
}

impl CopyPatch {
    /// The update patching every copy of the row keyed `key`.
    pub fn mutation(&self, key: &[Bson]) -> MutationRequest {
        let filter: Document = self
            .key_paths
            .iter()
            .cloned()
            .zip(key.iter().cloned())
            .collect();
        let mut set = Document::new();
        let mut unset = Document::new();
        match &self.change {
            CopyChange::Set(fields) => {
                for (column, value) in fields {
                    let path = format!("{}.{column}", self.copy_path);
                    match value {
                        Bson::Null => unset.insert(path, ""),
                        v => set.insert(path, v.clone()),
                    };
                }
            }
            CopyChange::Unset => {
                unset.insert(self.copy_path.clone(), "");
            }
        }
        let mut update = Document::new();
        if !set.is_empty() {
            update.insert("$set", set);
        }
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        let array_filters = match &self.array_filter {
            Some((identifier, fields)) => vec![fields
                .iter()
                .map(|f| format!("{identifier}.{f}"))
                .zip(key.iter().cloned())
                .collect()],
            None => vec![],
        };
        MutationRequest::Update(
            UpdateRequest::new(self.collection.clone(), filter, update)
                .with_array_filters(array_filters),
        )
    }
}

/// One patch per table holding copies of `map`'s rows.
pub(crate) fn copy_patches(
    ctx: &mut DocumentMapContext,
    map: &DocumentMap,
    change: &CopyChange,
) -> Result<Vec<CopyPatch>> {
    let mut patches = vec![];
    for target in map.copy_targets() {
        let holder = ctx.document(&target.parent_table)?;
        let hops = holder.hops();
        let top = holder.collection().to_string();
        let array = hops.iter().rposition(Hop::is_array);

        let mut key_paths = vec![];
        let mut relative = vec![];
        for key_column in map.primary_key() {
            let i = target
                .reference_columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(key_column))
                .ok_or_else(|| {
                    Error::Unsupported(format!(
                        "copy of '{}' in '{}' not keyed by its primary key",
                        map.table(),
                        target.parent_table
                    ))
                })?;
            let location = ctx.locate_column(&top, &hops, &target.columns[i])?;
            key_paths.push(location.path(&hops));
            if let Some(array) = array {
                if location.depth <= array {
                    return Err(Error::Unsupported(format!(
                        "copy of '{}' in '{}' is keyed above its array",
                        map.table(),
                        target.parent_table
                    )));
                }
                relative.push(element_relative(&hops, array, location.depth, &location.field));
            }
        }

        let mut segments = vec![];
        for (i, hop) in hops.iter().enumerate() {
            segments.push(hop.field().to_string());
            match array {
                Some(a) if a == i => segments.push("$[c]".to_string()),
                _ if hop.is_array() => segments.push("$[]".to_string()),
                _ => {}
            }
        }
        segments.push(target.embedded_table.clone());

        patches.push(CopyPatch {
            collection: top,
            key_paths,
            copy_path: segments.join("."),
            array_filter: array.map(|_| ("c".to_string(), relative)),
            change: change.clone(),
        });
    }
    Ok(patches)
}
