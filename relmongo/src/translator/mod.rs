//! Translation of a relational SELECT into an ordered aggregation pipeline.
//!
//! The translation runs the phases FROM, JOIN, WHERE, GROUP BY, HAVING,
//! SELECT and ORDER BY/LIMIT/OFFSET in order over one `ExpressionTranslator`,
//! collecting a `Pipeline` that `codegen` renders into stages.

use crate::{
    ast::Select,
    catalog::Catalog,
    codegen, decode,
    document_map::{self, DocumentMapContext},
    marshal::{self, Marshaller},
    options::TranslatorOptions,
    store::{LargeObjectStore, NoLargeObjects},
    types::{RelationalType, Value},
};
use bson::Document;
use itertools::Itertools;
use thiserror::Error;


mod definitions;
pub(crate) mod expressions;
mod functions;
pub(crate) mod match_query;
mod sources;
mod stages;

pub use definitions::*;
pub(crate) use expressions::{ExpressionTranslator, Mode, Scope};
pub(crate) use match_query::like_to_regex;
pub(crate) use sources::Source;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unsupported function '{0}'")]
    UnsupportedFunction(String),
    #[error("function '{0}' does not accept {1} arguments")]
    FunctionArity(String, usize),
    #[error("unknown table or alias '{0}'")]
    UnknownSource(String),
    #[error("table or alias '{0}' appears more than once")]
    DuplicateSource(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("column '{0}' is ambiguous")]
    AmbiguousColumn(String),
    #[error("tables {0:?} are not stored in the same document")]
    NotColocated(Vec<String>),
    #[error("'{0}' must appear in the GROUP BY clause or be used in an aggregate function")]
    ColumnNotGrouped(String),
    #[error("aggregate '{0}' is not allowed here")]
    AggregateNotAllowed(String),
    #[error("ORDER BY expression '{0}' must appear in the select list")]
    OrderByNotProjected(String),
    #[error("'{0}' does not only read columns of the nested row")]
    NotElementLocal(String),
    #[error("LIMIT ({0}) cannot be converted to i64")]
    LimitOutOfI64Range(u64),
    #[error("OFFSET ({0}) cannot be converted to i64")]
    OffsetOutOfI64Range(u64),
    #[error(transparent)]
    DocumentMap(#[from] document_map::Error),
    #[error(transparent)]
    Marshal(#[from] marshal::Error),
}

/// Surfaces the first error of a batch of independent translations.
pub(crate) fn first_error<T>(results: impl IntoIterator<Item = Result<T>>) -> Result<Vec<T>> {
    let (ok, errors): (Vec<T>, Vec<Error>) = results.into_iter().partition_result();
    match errors.into_iter().next() {
        Some(e) => Err(e),
        None => Ok(ok),
    }
}

/// One column of the query result and where it is read from in a result
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub path: String,
    pub ty: RelationalType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTranslation {
    pub collection: String,
    pub pipeline: Vec<Document>,
    pub columns: Vec<OutputColumn>,
}

impl QueryTranslation {
    /// Converts one result document into a row of relational values.
    pub fn decode_row(
        &self,
        document: &Document,
        large_objects: &dyn LargeObjectStore,
    ) -> marshal::Result<Vec<Value>> {
        decode::decode_row(&self.columns, document, &Marshaller::new(large_objects))
    }
}

pub fn translate_query(
    select: &Select,
    catalog: &Catalog,
    options: &TranslatorOptions,
) -> Result<QueryTranslation> {
    let mut ctx = DocumentMapContext::new(catalog);
    let placement = sources::place(&mut ctx, &select.from)?;
    let large_objects = NoLargeObjects;
    let translator = ExpressionTranslator::new(
        &mut ctx,
        placement.top.clone(),
        placement.sources.clone(),
        Marshaller::new(&large_objects),
        options,
        Mode::Pipeline,
    );
    let (pipeline, columns) = stages::SelectTranslator::new(translator, placement).translate(select)?;
    let collection = pipeline.collection.clone();
    let pipeline = codegen::generate_pipeline(pipeline);
    tracing::debug!(%collection, ?pipeline, "translated query");
    Ok(QueryTranslation {
        collection,
        pipeline,
        columns,
    })
}
