use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Root,
    Merged,
    Embeddable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    One,
    Many,
}

/// A merge, embed or copy relationship between a containing table and the
/// table whose rows (or row copies) live inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDetails {
    pub name: String,
    /// The table whose documents hold the rows.
    pub parent_table: String,
    /// The table whose rows are held.
    pub embedded_table: String,
    /// The foreign-key columns, on the referencing side.
    pub columns: Vec<String>,
    /// The referenced columns, paired with `columns` by position.
    pub reference_columns: Vec<String>,
    pub association: Association,
    /// A name to read the held rows under instead of the field itself.
    pub alias: Option<String>,
}

impl MergeDetails {
    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
            ..self.clone()
        }
    }
}

/// A foreign key, as a directed reference from `table` to `referenced_table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopKind {
    Merge,
    Embed,
}

/// One step from a document down to a sub-document holding another table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub kind: HopKind,
    pub details: MergeDetails,
}

impl Hop {
    pub fn merge(details: MergeDetails) -> Self {
        Self {
            kind: HopKind::Merge,
            details,
        }
    }

    pub fn embed(details: MergeDetails) -> Self {
        Self {
            kind: HopKind::Embed,
            details,
        }
    }

    /// Rows of a table are held under a field named after the table.
    pub fn field(&self) -> &str {
        &self.details.embedded_table
    }

    pub fn is_array(&self) -> bool {
        self.details.association == Association::Many
    }
}

/// The dotted path of the sub-document reached through `hops`. An aliased hop
/// is read from its top-level alias field instead of its nested location.
pub fn document_path(hops: &[Hop]) -> String {
    let mut segments: Vec<&str> = vec![];
    for hop in hops {
        match &hop.details.alias {
            Some(alias) => {
                segments.clear();
                segments.push(alias);
            }
            None => segments.push(hop.field()),
        }
    }
    segments.join(".")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMap {
    pub(crate) table: String,
    pub(crate) primary_key: Vec<String>,
    pub(crate) doc_type: DocumentType,
    pub(crate) merge_key: Option<MergeDetails>,
    pub(crate) parent: Option<Rc<DocumentMap>>,
    pub(crate) embedded_keys: Vec<MergeDetails>,
    pub(crate) copy_targets: Vec<MergeDetails>,
    pub(crate) references: Vec<Reference>,
    pub(crate) merged_children: Vec<String>,
}

impl DocumentMap {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    pub fn is_merged(&self) -> bool {
        self.doc_type == DocumentType::Merged
    }

    pub fn is_embeddable(&self) -> bool {
        self.doc_type == DocumentType::Embeddable
    }

    pub fn merge_key(&self) -> Option<&MergeDetails> {
        self.merge_key.as_ref()
    }

    pub fn parent(&self) -> Option<&Rc<DocumentMap>> {
        self.parent.as_ref()
    }

    pub fn embedded_keys(&self) -> &[MergeDetails] {
        &self.embedded_keys
    }

    pub fn copy_targets(&self) -> &[MergeDetails] {
        &self.copy_targets
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    pub fn merged_children(&self) -> &[String] {
        &self.merged_children
    }

    /// The table whose collection physically holds this table's rows.
    pub fn collection(&self) -> &str {
        match &self.parent {
            Some(p) => p.collection(),
            None => &self.table,
        }
    }

    /// The merge chain from the top-level document down to this table.
    pub fn hops(&self) -> Vec<Hop> {
        let mut hops = match &self.parent {
            Some(p) => p.hops(),
            None => vec![],
        };
        if let Some(details) = &self.merge_key {
            hops.push(Hop::merge(details.clone()));
        }
        hops
    }

    /// The dotted path of this table's rows below the top-level document. The
    /// positional form adds the all-elements operator after every array.
    pub fn qualified_name(&self, positional: bool) -> String {
        self.hops()
            .iter()
            .flat_map(|h| {
                let mut segments = vec![h.field().to_string()];
                if positional && h.is_array() {
                    segments.push("$[]".to_string());
                }
                segments
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The primary-key columns stored in this table's own `_id`, i.e. those not
    /// already implied by the merge key.
    pub fn id_columns(&self) -> Vec<String> {
        let inherited: &[String] = match &self.merge_key {
            Some(k) => &k.columns,
            None => &[],
        };
        self.primary_key
            .iter()
            .filter(|c| !inherited.iter().any(|i| i.eq_ignore_ascii_case(c)))
            .cloned()
            .collect()
    }

    /// The `_id`-relative field of a primary-key column, or None when the column
    /// is not part of the stored identifier.
    pub(crate) fn id_field(&self, column: &str, inherited: &[String]) -> Option<String> {
        if inherited.iter().any(|i| i.eq_ignore_ascii_case(column)) {
            return None;
        }
        let ids = self.id_columns();
        if !ids.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            return None;
        }
        if ids.len() == 1 {
            Some("_id".to_string())
        } else {
            Some(format!("_id.{column}"))
        }
    }
}
