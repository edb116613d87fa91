//! The narrow interface through which translated requests reach the document
//! store. Nothing in the translator talks to a driver directly.

use bson::{Bson, Document};
use thiserror::Error;

#[cfg(feature = "mongodb")]
pub mod mongodb;
#[cfg(test)]
pub(crate) mod recording;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("store driver error: {0}")]
    Driver(String),
    #[error("large object '{0}' not found")]
    LargeObjectNotFound(String),
    #[error("large object '{0}' is malformed")]
    MalformedLargeObject(String),
    #[error("large objects cannot be stored or read here")]
    LargeObjectsUnavailable,
}

/// Side storage for BLOB/CLOB/XML content. Documents only hold the generated
/// identifier of the stored content.
pub trait LargeObjectStore {
    fn put(&self, id: &str, content: Vec<u8>) -> Result<()>;
    fn get(&self, id: &str) -> Result<Vec<u8>>;
}

/// Used where no side store exists, such as literals in a read query.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLargeObjects;

impl LargeObjectStore for NoLargeObjects {
    fn put(&self, _id: &str, _content: Vec<u8>) -> Result<()> {
        Err(Error::LargeObjectsUnavailable)
    }

    fn get(&self, _id: &str) -> Result<Vec<u8>> {
        Err(Error::LargeObjectsUnavailable)
    }
}

/// The operations the translator needs from the store client.
pub trait DocumentStore: LargeObjectStore {
    fn large_objects(&self) -> &dyn LargeObjectStore;
    fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>>;
    fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>>;
    /// Inserts one document and returns the `_id` the store acknowledged.
    fn insert(&self, collection: &str, document: Document) -> Result<Bson>;
    /// Returns the number of documents matched.
    fn update(&self, request: &UpdateRequest) -> Result<u64>;
    /// Returns the number of documents removed.
    fn remove(&self, collection: &str, filter: Document) -> Result<u64>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub collection: String,
    pub filter: Document,
    pub update: Document,
    pub array_filters: Vec<Document>,
    pub multi: bool,
}

impl UpdateRequest {
    pub fn new(collection: impl Into<String>, filter: Document, update: Document) -> Self {
        Self {
            collection: collection.into(),
            filter,
            update,
            array_filters: vec![],
            multi: true,
        }
    }

    pub fn with_array_filters(mut self, array_filters: Vec<Document>) -> Self {
        self.array_filters = array_filters;
        self
    }

    pub fn single(mut self) -> Self {
        self.multi = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRequest {
    pub collection: String,
    pub pipeline: Vec<Document>,
}

/// One mutation to send to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRequest {
    Insert {
        collection: String,
        document: Document,
    },
    Update(UpdateRequest),
    Remove {
        collection: String,
        filter: Document,
    },
}

impl MutationRequest {
    pub fn collection(&self) -> &str {
        match self {
            MutationRequest::Insert { collection, .. }
            | MutationRequest::Remove { collection, .. } => collection,
            MutationRequest::Update(u) => &u.collection,
        }
    }

    /// Sends the mutation and returns the number of documents it touched, plus
    /// the acknowledged `_id` for inserts.
    pub fn apply(&self, store: &dyn DocumentStore) -> Result<(u64, Option<Bson>)> {
        match self {
            MutationRequest::Insert {
                collection,
                document,
            } => {
                let id = store.insert(collection, document.clone())?;
                Ok((1, Some(id)))
            }
            MutationRequest::Update(u) => Ok((store.update(u)?, None)),
            MutationRequest::Remove { collection, filter } => {
                Ok((store.remove(collection, filter.clone())?, None))
            }
        }
    }
}
