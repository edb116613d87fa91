//! The per-table model of how relational tables are laid out in documents.
//!
//! Every table is either a top-level collection (`Root`), merged into a parent
//! document (`Merged`), or a top-level collection whose rows are also copied
//! into the documents that reference them (`Embeddable`). Maps are built
//! lazily from catalog metadata and memoized in a `DocumentMapContext`, which
//! lives for exactly one translation.

use crate::catalog::{Catalog, ForeignKey, Table};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    rc::Rc,
};
use thiserror::Error;

mod definitions;
pub use definitions::*;


pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("table '{0}' cannot be both merged and embeddable")]
    MergedAndEmbeddable(String),
    #[error("foreign key '{key}' of table '{table}' has {columns} columns but references {referenced}")]
    KeyColumnMismatch {
        table: String,
        key: String,
        columns: usize,
        referenced: usize,
    },
    #[error("table '{table}' is merged into '{parent}' but has no foreign key to it")]
    MissingMergeKey { table: String, parent: String },
    #[error("table '{table}' is merged into '{parent}' but has several foreign keys to it")]
    AmbiguousMergeKey { table: String, parent: String },
    #[error("merge or embed relationships of table '{0}' form a cycle")]
    Cyclic(String),
    #[error("tables '{0}' and '{1}' are related by both an embed and a copy link")]
    EmbedCopyConflict(String, String),
    #[error("table '{target}' is reachable from '{from}' in more than one way")]
    AmbiguousReachability { from: String, target: String },
}

/// Where a column's value lives, relative to a placement of its table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLocation {
    /// The number of hops from the top-level document to the sub-document
    /// holding the field.
    pub depth: usize,
    pub field: String,
}

impl FieldLocation {
    /// The dotted path of this location below the top-level document.
    pub fn path(&self, hops: &[Hop]) -> String {
        match document_path(&hops[..self.depth]) {
            prefix if prefix.is_empty() => self.field.clone(),
            prefix => format!("{prefix}.{}", self.field),
        }
    }
}

/// Memoizes document maps for one translation.
pub struct DocumentMapContext<'c> {
    catalog: &'c Catalog,
    maps: HashMap<String, Rc<DocumentMap>>,
    building: BTreeSet<String>,
}

impl<'c> fmt::Debug for DocumentMapContext<'c> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentMapContext")
            .field("maps", &self.maps.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

fn same(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

fn same_columns(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| same(x, y)))
}

impl<'c> DocumentMapContext<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            maps: HashMap::new(),
            building: BTreeSet::new(),
        }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn table(&self, name: &str) -> Result<&'c Table> {
        self.catalog
            .get_table(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Returns the document map for `table`, building it on first use.
    pub fn document(&mut self, table: &str) -> Result<Rc<DocumentMap>> {
        if let Some(map) = self.maps.get(&key(table)) {
            return Ok(map.clone());
        }
        if !self.building.insert(key(table)) {
            return Err(Error::Cyclic(table.to_string()));
        }
        let built = self.build(table);
        self.building.remove(&key(table));
        let map = Rc::new(built?);
        self.maps.insert(key(table), map.clone());
        Ok(map)
    }

    fn build(&mut self, name: &str) -> Result<DocumentMap> {
        let table = self.table(name)?;
        let props = &table.properties;
        if props.merge_into.is_some() && props.is_embeddable() {
            return Err(Error::MergedAndEmbeddable(table.name.clone()));
        }

        // every foreign key, regardless of layout
        let references = table
            .foreign_keys
            .iter()
            .map(|fk| self.reference(table, fk))
            .collect::<Result<Vec<_>>>()?;

        let copy_targets = if props.is_embeddable() {
            self.copy_targets(table)?
        } else {
            vec![]
        };

        let mut embedded_keys: Vec<MergeDetails> = vec![];
        for reference in &references {
            let target = self.table(&reference.referenced_table)?;
            if !embeds_into(target, table)
                || props
                    .merge_into
                    .as_deref()
                    .is_some_and(|p| same(p, &target.name))
            {
                continue;
            }
            if embedded_keys
                .iter()
                .any(|k| same(&k.embedded_table, &target.name))
            {
                return Err(Error::AmbiguousReachability {
                    from: table.name.clone(),
                    target: target.name.clone(),
                });
            }
            if copy_targets
                .iter()
                .any(|c| same(&c.parent_table, &target.name))
            {
                return Err(Error::EmbedCopyConflict(
                    table.name.clone(),
                    target.name.clone(),
                ));
            }
            if self.embed_chain_reaches(&target.name, &table.name, &mut BTreeSet::new())? {
                return Err(Error::Cyclic(table.name.clone()));
            }
            embedded_keys.push(MergeDetails {
                name: reference.name.clone(),
                parent_table: table.name.clone(),
                embedded_table: target.name.clone(),
                columns: reference.columns.clone(),
                reference_columns: reference.referenced_columns.clone(),
                association: Association::One,
                alias: None,
            });
        }

        let (doc_type, merge_key, parent) = match &props.merge_into {
            Some(parent_name) => {
                let parent = self.document(parent_name)?;
                let merge_key = self.merge_key(table, &references, &parent)?;
                (DocumentType::Merged, Some(merge_key), Some(parent))
            }
            None if props.is_embeddable() => (DocumentType::Embeddable, None, None),
            None => (DocumentType::Root, None, None),
        };

        let merged_children = self
            .catalog
            .tables()
            .filter(|t| {
                t.properties
                    .merge_into
                    .as_deref()
                    .is_some_and(|p| same(p, &table.name))
            })
            .map(|t| t.name.clone())
            .collect();

        Ok(DocumentMap {
            table: table.name.clone(),
            primary_key: table.primary_key.clone(),
            doc_type,
            merge_key,
            parent,
            embedded_keys,
            copy_targets,
            references,
            merged_children,
        })
    }

    fn reference(&self, table: &Table, fk: &ForeignKey) -> Result<Reference> {
        let target = self.table(&fk.referenced_table)?;
        for column in &fk.columns {
            if table.get_column(column).is_none() {
                return Err(Error::UnknownColumn {
                    table: table.name.clone(),
                    column: column.clone(),
                });
            }
        }
        let referenced_columns = if fk.referenced_columns.is_empty() {
            target.primary_key.clone()
        } else {
            fk.referenced_columns.clone()
        };
        if referenced_columns.len() != fk.columns.len() {
            return Err(Error::KeyColumnMismatch {
                table: table.name.clone(),
                key: fk.name.clone(),
                columns: fk.columns.len(),
                referenced: referenced_columns.len(),
            });
        }
        Ok(Reference {
            name: fk.name.clone(),
            table: table.name.clone(),
            columns: fk.columns.clone(),
            referenced_table: target.name.clone(),
            referenced_columns,
        })
    }

    /// One copy target per foreign key, in another table, that references this
    /// table's primary key.
    fn copy_targets(&self, table: &Table) -> Result<Vec<MergeDetails>> {
        let mut targets: Vec<MergeDetails> = vec![];
        for other in self.catalog.tables() {
            if same(&other.name, &table.name) || !embeds_into(table, other) {
                continue;
            }
            // a table's merge parent already holds its rows
            if other
                .properties
                .merge_into
                .as_deref()
                .is_some_and(|p| same(p, &table.name))
            {
                continue;
            }
            for fk in other.foreign_keys_to(&table.name) {
                let reference = self.reference(other, fk)?;
                if !same_columns(&reference.referenced_columns, &table.primary_key) {
                    continue;
                }
                if targets.iter().any(|t| same(&t.parent_table, &other.name)) {
                    return Err(Error::AmbiguousReachability {
                        from: other.name.clone(),
                        target: table.name.clone(),
                    });
                }
                targets.push(MergeDetails {
                    name: fk.name.clone(),
                    parent_table: other.name.clone(),
                    embedded_table: table.name.clone(),
                    columns: reference.columns,
                    reference_columns: reference.referenced_columns,
                    association: Association::One,
                    alias: None,
                });
            }
        }
        Ok(targets)
    }

    fn merge_key(
        &self,
        table: &Table,
        references: &[Reference],
        parent: &DocumentMap,
    ) -> Result<MergeDetails> {
        let mut candidates = references
            .iter()
            .filter(|r| same(&r.referenced_table, &parent.table));
        let fk = match (candidates.next(), candidates.next()) {
            (Some(fk), None) => fk,
            (None, _) => {
                return Err(Error::MissingMergeKey {
                    table: table.name.clone(),
                    parent: parent.table.clone(),
                })
            }
            (Some(_), Some(_)) => {
                return Err(Error::AmbiguousMergeKey {
                    table: table.name.clone(),
                    parent: parent.table.clone(),
                })
            }
        };
        let parent_refers_back = parent
            .references
            .iter()
            .any(|r| same(&r.referenced_table, &table.name));
        let association = if parent_refers_back || same_columns(&fk.columns, &table.primary_key)
        {
            Association::One
        } else {
            Association::Many
        };
        Ok(MergeDetails {
            name: fk.name.clone(),
            parent_table: parent.table.clone(),
            embedded_table: table.name.clone(),
            columns: fk.columns.clone(),
            reference_columns: fk.referenced_columns.clone(),
            association,
            alias: None,
        })
    }

    /// Whether following embed links from `from` leads back to `to`.
    fn embed_chain_reaches(
        &self,
        from: &str,
        to: &str,
        visited: &mut BTreeSet<String>,
    ) -> Result<bool> {
        if !visited.insert(key(from)) {
            return Ok(false);
        }
        let table = self.table(from)?;
        for fk in &table.foreign_keys {
            let target = self.table(&fk.referenced_table)?;
            if !embeds_into(target, table) {
                continue;
            }
            if same(&target.name, to) || self.embed_chain_reaches(&target.name, to, visited)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether `other` is merged, directly or transitively, into `table`.
    pub fn merges(&mut self, table: &str, other: &str) -> Result<bool> {
        let other = self.document(other)?;
        let mut current = other.parent.clone();
        while let Some(p) = current {
            if same(&p.table, table) {
                return Ok(true);
            }
            current = p.parent.clone();
        }
        Ok(false)
    }

    /// Whether a copy of `other` is kept in `table`'s documents, directly, in a
    /// table merged into it, or inside another embedded copy.
    pub fn embeds(&mut self, table: &str, other: &str) -> Result<bool> {
        Ok(self
            .routes(table, other)?
            .iter()
            .any(|route| route.iter().any(|h| h.kind == HopKind::Embed)))
    }

    /// Whether `other`'s rows can be found inside `table`'s documents.
    pub fn contains(&mut self, table: &str, other: &str) -> Result<bool> {
        Ok(!self.routes(table, other)?.is_empty())
    }

    /// The unique hop sequence leading from a `top` document down to `target`.
    pub fn route(&mut self, top: &str, target: &str) -> Result<Option<Vec<Hop>>> {
        let mut routes = self.routes(top, target)?;
        match routes.len() {
            0 => Ok(None),
            1 => Ok(routes.pop()),
            _ => Err(Error::AmbiguousReachability {
                from: top.to_string(),
                target: target.to_string(),
            }),
        }
    }

    fn routes(&mut self, from: &str, target: &str) -> Result<Vec<Vec<Hop>>> {
        let mut found = vec![];
        self.collect_routes(from, target, &mut vec![], &mut found)?;
        Ok(found)
    }

    fn collect_routes(
        &mut self,
        from: &str,
        target: &str,
        prefix: &mut Vec<Hop>,
        found: &mut Vec<Vec<Hop>>,
    ) -> Result<()> {
        let map = self.document(from)?;
        let mut next = vec![];
        for child in &map.merged_children {
            let child = self.document(child)?;
            if let Some(details) = &child.merge_key {
                next.push(Hop::merge(details.clone()));
            }
        }
        for details in &map.embedded_keys {
            next.push(Hop::embed(details.clone()));
        }
        for hop in next {
            let table = hop.details.embedded_table.clone();
            prefix.push(hop);
            if same(&table, target) {
                found.push(prefix.clone());
            } else {
                self.collect_routes(&table, target, prefix, found)?;
            }
            prefix.pop();
        }
        Ok(())
    }

    /// Locates `column` of the table reached by `hops` (or of `top` when `hops`
    /// is empty). Merge-key columns resolve to the parent's referenced
    /// columns and the primary key of an embedded copy resolves to the
    /// referencing columns, since neither is stored twice.
    pub fn locate_column(&mut self, top: &str, hops: &[Hop], column: &str) -> Result<FieldLocation> {
        let (table, parent) = match hops.split_last() {
            Some((last, rest)) => (last.details.embedded_table.clone(), Some((last, rest))),
            None => (top.to_string(), None),
        };
        let map = self.document(&table)?;
        let def = self.table(&table)?;
        let column = def
            .get_column(column)
            .map(|c| c.name.clone())
            .ok_or_else(|| Error::UnknownColumn {
                table: table.clone(),
                column: column.to_string(),
            })?;
        let depth = hops.len();
        match parent {
            None => Ok(FieldLocation {
                depth,
                field: map.id_field(&column, &[]).unwrap_or(column),
            }),
            Some((hop, rest)) => match hop.kind {
                HopKind::Merge => {
                    if let Some(i) = hop.details.columns.iter().position(|c| same(c, &column)) {
                        let referenced = hop.details.reference_columns[i].clone();
                        return self.locate_column(top, rest, &referenced);
                    }
                    Ok(FieldLocation {
                        depth,
                        field: map
                            .id_field(&column, &hop.details.columns)
                            .unwrap_or(column),
                    })
                }
                HopKind::Embed => {
                    if let Some(i) = hop
                        .details
                        .reference_columns
                        .iter()
                        .position(|c| same(c, &column))
                    {
                        let referencing = hop.details.columns[i].clone();
                        return self.locate_column(top, rest, &referencing);
                    }
                    Ok(FieldLocation {
                        depth,
                        field: column,
                    })
                }
            },
        }
    }
}

/// Whether rows of `target` are copied into documents of `into`.
fn embeds_into(target: &Table, into: &Table) -> bool {
    let props = &target.properties;
    props.embeddable
        || props
            .embeddable_into
            .as_deref()
            .is_some_and(|t| same(t, &into.name))
}
