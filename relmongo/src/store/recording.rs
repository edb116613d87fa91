use crate::store::{DocumentStore, Error, LargeObjectStore, Result, UpdateRequest};
use bson::{Bson, Document};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, VecDeque},
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Aggregate {
        collection: String,
        pipeline: Vec<Document>,
    },
    FindOne {
        collection: String,
        filter: Document,
    },
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

/// An in-memory store that records every call and answers reads from
/// scripted results, in order.
#[derive(Default)]
pub(crate) struct RecordingStore {
    pub calls: RefCell<Vec<Call>>,
    pub aggregate_results: RefCell<VecDeque<Vec<Document>>>,
    pub find_one_results: RefCell<VecDeque<Option<Document>>>,
    pub large_objects: RefCell<BTreeMap<String, Vec<u8>>>,
    /// Returned by `update` and `remove`.
    pub matched: Cell<u64>,
    pub next_generated_id: Cell<i32>,
    /// Acknowledge inserts without `_id` with an ObjectId, as MongoDB does.
    pub generate_object_ids: Cell<bool>,
    pub fail_updates_on: RefCell<Option<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        let store = Self::default();
        store.matched.set(1);
        store.next_generated_id.set(100);
        store
    }

    pub fn with_aggregate_result(self, documents: Vec<Document>) -> Self {
        self.aggregate_results.borrow_mut().push_back(documents);
        self
    }

    pub fn with_find_one_result(self, document: Option<Document>) -> Self {
        self.find_one_results.borrow_mut().push_back(document);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn updates(&self) -> Vec<UpdateRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Update(u) => Some(u.clone()),
                _ => None,
            })
            .collect()
    }
}

impl LargeObjectStore for RecordingStore {
    fn put(&self, id: &str, content: Vec<u8>) -> Result<()> {
        self.large_objects
            .borrow_mut()
            .insert(id.to_string(), content);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>> {
        self.large_objects
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::LargeObjectNotFound(id.to_string()))
    }
}

impl DocumentStore for RecordingStore {
    fn large_objects(&self) -> &dyn LargeObjectStore {
        self
    }

    fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        self.calls.borrow_mut().push(Call::Aggregate {
            collection: collection.to_string(),
            pipeline,
        });
        Ok(self
            .aggregate_results
            .borrow_mut()
            .pop_front()
            .unwrap_or_default())
    }

    fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        self.calls.borrow_mut().push(Call::FindOne {
            collection: collection.to_string(),
            filter,
        });
        Ok(self.find_one_results.borrow_mut().pop_front().flatten())
    }

    fn insert(&self, collection: &str, document: Document) -> Result<Bson> {
        let id = match document.get("_id") {
            Some(id) => id.clone(),
            None if self.generate_object_ids.get() => Bson::ObjectId(bson::oid::ObjectId::new()),
            None => {
                let id = self.next_generated_id.get();
                self.next_generated_id.set(id + 1);
                Bson::Int32(id)
            }
        };
        self.calls.borrow_mut().push(Call::Insert {
            collection: collection.to_string(),
            document,
        });
        Ok(id)
    }

    fn update(&self, request: &UpdateRequest) -> Result<u64> {
        self.calls.borrow_mut().push(Call::Update(request.clone()));
        if self.fail_updates_on.borrow().as_deref() == Some(request.collection.as_str()) {
            return Err(Error::Driver("update rejected".to_string()));
        }
        Ok(self.matched.get())
    }

    fn remove(&self, collection: &str, filter: Document) -> Result<u64> {
        self.calls.borrow_mut().push(Call::Remove {
            collection: collection.to_string(),
            filter,
        });
        Ok(self.matched.get())
    }
}
