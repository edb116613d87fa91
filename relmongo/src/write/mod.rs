//! Translation of INSERT, UPDATE and DELETE into store mutations.
//!
//! Translation produces a `WritePlan` without touching the store, apart from
//! uploading large objects. The `WriteExecutor` then runs the plan: it fetches
//! embedded copies, reads what a nested-row write needs, and sends the
//! mutations. None of this is atomic across documents.

use crate::{
    ast::Command,
    catalog::Catalog,
    document_map::{self, DocumentMapContext},
    marshal::{self, Marshaller},
    options::TranslatorOptions,
    store::{self, AggregateRequest, LargeObjectStore, MutationRequest, UpdateRequest},
    translator,
    types::RelationalType,
};
use bson::{Bson, Document};
use thiserror::Error;

mod eval;
mod executor;
mod insert;
mod locator;
mod mutate;
mod row_info;

#[cfg(test)]
mod test;

pub use executor::{execute_write, WriteExecutor, WriteOutcome};
pub use locator::{CopyChange, CopyPatch};
pub use mutate::{NestedAction, NestedColumn, NestedMutations, NestedRowWrite};
pub use row_info::RowInfo;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("expected {expected} values per row, found {actual}")]
    ColumnCount { expected: usize, actual: usize },
    #[error("a row of '{0}' needs its key columns")]
    MissingKey(String),
    #[error("a row of '{0}' needs the key of the row it is stored in")]
    MissingParentKey(String),
    #[error("primary key column '{0}' cannot be updated")]
    PrimaryKeyUpdate(String),
    #[error("'{0}' is not a constant")]
    NonLiteralValue(String),
    #[error("cannot evaluate {0} here")]
    Evaluation(String),
    #[error(transparent)]
    Translator(#[from] translator::Error),
    #[error(transparent)]
    DocumentMap(#[from] document_map::Error),
    #[error(transparent)]
    Marshal(#[from] marshal::Error),
    #[error(transparent)]
    Store(#[from] store::Error),
}

/// An embedded copy to fetch before a row is written. Without a source the
/// copy is cleared, as when the referencing columns are set to NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyFetch {
    /// The field holding the copy, relative to the written row.
    pub field: String,
    /// The collection and filter of the referenced row.
    pub source: Option<(String, Document)>,
}

/// A fetched copy, with its `_id` stripped. None when the referenced row does
/// not exist or the reference was cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCopy {
    pub field: String,
    pub document: Option<Document>,
}

/// Adds `$set` or `$unset` entries writing `copies` below `prefix`.
pub(crate) fn write_copies(update: &mut Document, prefix: &str, copies: &[ResolvedCopy]) {
    for copy in copies {
        let path = if prefix.is_empty() {
            copy.field.clone()
        } else {
            format!("{prefix}.{}", copy.field)
        };
        let (op, value) = match &copy.document {
            Some(d) => ("$set", Bson::Document(d.clone())),
            None => ("$unset", Bson::String(String::new())),
        };
        add_operator(update, op, path, value);
    }
}

pub(crate) fn add_operator(update: &mut Document, op: &str, path: String, value: Bson) {
    if let Ok(fields) = update.get_document_mut(op) {
        fields.insert(path, value);
        return;
    }
    let mut fields = Document::new();
    fields.insert(path, value);
    update.insert(op, fields);
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertTarget {
    /// A new top-level document.
    Collection(String),
    /// Added to the parent row: appended to its array for a MANY merge,
    /// set as its sub-document for a ONE merge.
    Parent {
        collection: String,
        filter: Document,
        path: String,
        array_filters: Vec<Document>,
        many: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    pub target: InsertTarget,
    pub row: Document,
    pub copies: Vec<CopyFetch>,
}

impl InsertRow {
    /// The mutation writing this row, with its embedded copies attached.
    pub fn mutation(&self, copies: &[ResolvedCopy]) -> MutationRequest {
        let mut row = self.row.clone();
        for copy in copies {
            if let Some(d) = &copy.document {
                row.insert(copy.field.clone(), d.clone());
            }
        }
        match &self.target {
            InsertTarget::Collection(collection) => MutationRequest::Insert {
                collection: collection.clone(),
                document: row,
            },
            InsertTarget::Parent {
                collection,
                filter,
                path,
                array_filters,
                many,
            } => {
                let mut update = Document::new();
                add_operator(
                    &mut update,
                    if *many { "$push" } else { "$set" },
                    path.clone(),
                    Bson::Document(row),
                );
                MutationRequest::Update(
                    UpdateRequest::new(collection.clone(), filter.clone(), update)
                        .with_array_filters(array_filters.clone())
                        .single(),
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    pub table: String,
    pub rows: Vec<InsertRow>,
    /// The auto-generated key column the store assigns, with its type.
    pub generated_key: Option<(String, RelationalType)>,
}

/// Reads the keys of the rows a direct write touches, so their copies can be
/// patched afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagation {
    pub key_query: AggregateRequest,
    pub key_columns: Vec<String>,
    pub patches: Vec<CopyPatch>,
}

/// A bulk update or removal of top-level documents.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectPlan {
    pub table: String,
    pub mutation: MutationRequest,
    /// Copies refreshed by the update, written next to the assigned columns.
    pub copies: Vec<CopyFetch>,
    pub propagation: Option<Propagation>,
}

impl DirectPlan {
    pub fn mutation(&self, copies: &[ResolvedCopy]) -> MutationRequest {
        match &self.mutation {
            MutationRequest::Update(u) if !copies.is_empty() => {
                let mut update = u.update.clone();
                write_copies(&mut update, "", copies);
                MutationRequest::Update(UpdateRequest {
                    update,
                    ..u.clone()
                })
            }
            m => m.clone(),
        }
    }
}

/// Removes matching elements of a merged array with one `$pull`.
#[derive(Debug, Clone, PartialEq)]
pub struct PullPlan {
    pub table: String,
    /// Counts the elements the pull removes, as `{n: <count>}`.
    pub count_query: AggregateRequest,
    pub mutation: UpdateRequest,
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq)]
pub enum WritePlan {
    Insert(InsertPlan),
    Direct(DirectPlan),
    Pull(PullPlan),
    Nested(NestedRowWrite),
}

pub struct WriteTranslator<'a, 'c> {
    ctx: DocumentMapContext<'c>,
    options: &'a TranslatorOptions,
    marshaller: Marshaller<'a>,
}

impl<'a, 'c> WriteTranslator<'a, 'c> {
    pub fn new(
        catalog: &'c Catalog,
        options: &'a TranslatorOptions,
        marshaller: Marshaller<'a>,
    ) -> Self {
        Self {
            ctx: DocumentMapContext::new(catalog),
            options,
            marshaller,
        }
    }

    pub fn translate(&mut self, command: &Command) -> Result<WritePlan> {
        match command {
            Command::Insert(insert) => Ok(WritePlan::Insert(self.translate_insert(insert)?)),
            Command::Update(update) => self.translate_update(update),
            Command::Delete(delete) => self.translate_delete(delete),
            Command::Select(_) => Err(Error::Unsupported("SELECT is not a write".to_string())),
        }
    }
}

pub fn translate_write(
    command: &Command,
    catalog: &Catalog,
    options: &TranslatorOptions,
    large_objects: &dyn LargeObjectStore,
) -> Result<WritePlan> {
    let plan = WriteTranslator::new(catalog, options, Marshaller::new(large_objects))
        .translate(command)?;
    tracing::debug!(?plan, "translated write");
    Ok(plan)
}
