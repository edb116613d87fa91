//! The metadata catalog consumed by the translator: tables, columns, keys and the
//! two document-mapping properties (`merge_into`, `embeddable`/`embeddable_into`).
//! Catalog discovery happens elsewhere; this module only holds the result.

use crate::types::RelationalType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: RelationalType,
    /// The store assigns the value when the column is omitted from an INSERT.
    #[serde(default)]
    pub auto_generated: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: RelationalType) -> Self {
        Self {
            name: name.into(),
            ty,
            auto_generated: false,
        }
    }

    pub fn auto_generated(mut self) -> Self {
        self.auto_generated = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub referenced_table: String,
    /// Empty means the referenced table's primary key.
    #[serde(default)]
    pub referenced_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
        referenced_table: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            referenced_table: referenced_table.into(),
            referenced_columns: vec![],
        }
    }
}

/// Custom per-table properties that drive the document layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableProperties {
    /// The rows of this table live inside documents of the named table.
    #[serde(default)]
    pub merge_into: Option<String>,
    /// A denormalized copy of each row is kept inside every referencing document.
    #[serde(default)]
    pub embeddable: bool,
    /// Like `embeddable`, restricted to documents of the named table.
    #[serde(default)]
    pub embeddable_into: Option<String>,
}

impl TableProperties {
    pub fn is_embeddable(&self) -> bool {
        self.embeddable || self.embeddable_into.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub properties: TableProperties,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![],
            primary_key: vec![],
            foreign_keys: vec![],
            properties: TableProperties::default(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn merge_into(mut self, parent: impl Into<String>) -> Self {
        self.properties.merge_into = Some(parent.into());
        self
    }

    pub fn embeddable(mut self) -> Self {
        self.properties.embeddable = true;
        self
    }

    pub fn embeddable_into(mut self, table: impl Into<String>) -> Self {
        self.properties.embeddable_into = Some(table.into());
        self
    }

    /// Looks a column up by name, ignoring case.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn is_primary_key_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.primary_key
            .iter()
            .filter_map(move |name| self.get_column(name))
    }

    /// The single auto-generated primary key column, if the key has that shape.
    pub fn generated_key_column(&self) -> Option<&Column> {
        match self.primary_key.as_slice() {
            [name] => self.get_column(name).filter(|c| c.auto_generated),
            _ => None,
        }
    }

    pub fn foreign_keys_to<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ForeignKey> {
        self.foreign_keys
            .iter()
            .filter(move |fk| fk.referenced_table.eq_ignore_ascii_case(table))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    pub fn new(tables: BTreeMap<String, Table>) -> Catalog {
        Catalog { tables }
    }

    /// Table names are matched case-insensitively.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(&name.to_lowercase())
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn insert(&mut self, table: Table) -> Option<Table> {
        self.tables.insert(table.name.to_lowercase(), table)
    }
}

impl FromIterator<Table> for Catalog {
    fn from_iter<I: IntoIterator<Item = Table>>(iter: I) -> Self {
        let mut c = Catalog::default();
        for t in iter {
            c.insert(t);
        }
        c
    }
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            tables: Vec<Table>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Ok(raw.tables.into_iter().collect())
    }
}
