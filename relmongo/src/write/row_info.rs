use crate::{decode::get_path, document_map::Hop};
use bson::{Bson, Document};
use std::rc::Rc;

/// Locates one row inside a fetched top-level document: the table it belongs
/// to, the field and array index it is held under, and the row holding it.
#[derive(Debug, Clone, PartialEq)]
pub struct RowInfo {
    pub table: String,
    /// The field of the parent row holding this row; None for the top-level
    /// document.
    pub field: Option<String>,
    /// The `_id` of the parent row, when it has one.
    pub parent_key: Option<Bson>,
    /// The position in the parent's array, for rows of a MANY merge.
    pub index: Option<usize>,
    pub parent: Option<Rc<RowInfo>>,
    pub row: Document,
}

impl RowInfo {
    pub fn top(table: impl Into<String>, row: Document) -> Rc<Self> {
        Rc::new(Self {
            table: table.into(),
            field: None,
            parent_key: None,
            index: None,
            parent: None,
            row,
        })
    }

    /// Every row one hop below `parent`. A missing or null field holds none.
    pub fn children(parent: &Rc<Self>, hop: &Hop) -> Vec<Rc<Self>> {
        let field = hop.field().to_string();
        let child = |index: Option<usize>, row: &Document| {
            Rc::new(Self {
                table: hop.details.embedded_table.clone(),
                field: Some(field.clone()),
                parent_key: parent.row.get("_id").cloned(),
                index,
                parent: Some(parent.clone()),
                row: row.clone(),
            })
        };
        match parent.row.get(&field) {
            Some(Bson::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| match item {
                    Bson::Document(d) => Some(child(Some(i), d)),
                    _ => None,
                })
                .collect(),
            Some(Bson::Document(d)) => vec![child(None, d)],
            _ => vec![],
        }
    }

    /// The rows reached from `top` by following `hops`.
    pub fn walk(top: &Rc<Self>, hops: &[Hop]) -> Vec<Rc<Self>> {
        hops.iter().fold(vec![top.clone()], |rows, hop| {
            rows.iter().flat_map(|r| Self::children(r, hop)).collect()
        })
    }

    /// The chain from the top-level document down to this row.
    pub fn lineage(self: &Rc<Self>) -> Vec<Rc<Self>> {
        let mut chain = vec![self.clone()];
        while let Some(parent) = chain.last().and_then(|r| r.parent.clone()) {
            chain.push(parent);
        }
        chain.reverse();
        chain
    }

    pub fn top_id(self: &Rc<Self>) -> Option<Bson> {
        self.lineage().first().and_then(|t| t.row.get("_id").cloned())
    }

    /// The dotted path of this row inside the top-level document, with array
    /// positions spelled out, e.g. `orders.3.lineitem.0`.
    pub fn positional_path(&self) -> String {
        let mut segments = match &self.parent {
            Some(parent) => match parent.positional_path() {
                p if p.is_empty() => vec![],
                p => vec![p],
            },
            None => return String::new(),
        };
        if let Some(field) = &self.field {
            segments.push(field.clone());
        }
        if let Some(i) = self.index {
            segments.push(i.to_string());
        }
        segments.join(".")
    }

    /// The path of the field holding this row, without its array position.
    pub fn container_path(&self) -> String {
        let parent = self
            .parent
            .as_ref()
            .map(|p| p.positional_path())
            .unwrap_or_default();
        match (parent.is_empty(), &self.field) {
            (_, None) => parent,
            (true, Some(f)) => f.clone(),
            (false, Some(f)) => format!("{parent}.{f}"),
        }
    }

    /// Reads a field of the row `depth` levels below the top-level document.
    pub fn value_at(self: &Rc<Self>, depth: usize, field: &str) -> Option<Bson> {
        let lineage = self.lineage();
        lineage
            .get(depth)
            .and_then(|r| get_path(&r.row, field))
            .cloned()
    }
}
