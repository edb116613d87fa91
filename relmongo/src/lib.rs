//! Pushes relational queries and writes down to a document store.
//!
//! Tables are laid out in documents by the `merge_into` and `embeddable`
//! catalog properties: merged rows live inside their parent document, and
//! embeddable rows are copied into the documents that reference them. SELECT
//! becomes one aggregation pipeline over a single collection; INSERT, UPDATE
//! and DELETE become a `WritePlan` that `execute_write` runs against a store.

pub mod ast;
pub mod catalog;
mod codegen;
mod decode;
pub mod document_map;
mod mapping_registry;
pub mod marshal;
pub mod options;
mod planner;
pub mod result;
pub mod store;
#[cfg(test)]
pub(crate) mod test_util;
pub mod translator;
pub mod types;
pub mod usererror;
pub mod write;

pub use translator::{translate_query, OutputColumn, QueryTranslation};
pub use write::{execute_write, translate_write, WriteOutcome, WritePlan};

use crate::{
    ast::Command, catalog::Catalog, options::TranslatorOptions, result::Result,
    store::DocumentStore,
};

/// The translation of any command.
#[allow(clippy::large_enum_variant)]
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    Query(QueryTranslation),
    Write(WritePlan),
}

/// Translates `command` without running it. Large object values in writes
/// are uploaded to `store` as part of the translation.
pub fn translate(
    command: &Command,
    catalog: &Catalog,
    options: &TranslatorOptions,
    store: &dyn DocumentStore,
) -> Result<Translation> {
    Ok(match command {
        Command::Select(select) => Translation::Query(translate_query(select, catalog, options)?),
        c => Translation::Write(translate_write(c, catalog, options, store.large_objects())?),
    })
}

/// Translates and runs `command`. A query returns its decoded rows, a write
/// its outcome.
pub fn execute(
    command: &Command,
    catalog: &Catalog,
    options: &TranslatorOptions,
    store: &dyn DocumentStore,
) -> Result<Execution> {
    match translate(command, catalog, options, store)? {
        Translation::Query(query) => {
            let documents = store.aggregate(&query.collection, query.pipeline.clone())?;
            let rows = documents
                .iter()
                .map(|d| query.decode_row(d, store.large_objects()))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(Execution::Rows {
                columns: query.columns.into_iter().map(|c| c.name).collect(),
                rows,
            })
        }
        Translation::Write(plan) => Ok(Execution::Write(execute_write(&plan, store)?)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Execution {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<types::Value>>,
    },
    Write(WriteOutcome),
}
