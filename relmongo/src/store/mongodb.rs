use crate::store::{DocumentStore, Error, LargeObjectStore, Result, UpdateRequest};
use bson::{doc, spec::BinarySubtype, Binary, Bson, Document};
use mongodb::sync::{Client, Collection, Database};

/// A `DocumentStore` over the synchronous MongoDB driver. Large objects are
/// kept in a side collection as `{_id: <uuid>, data: <binary>}`.
pub struct MongoStore {
    db: Database,
    large_object_collection: String,
}

impl From<mongodb::error::Error> for Error {
    fn from(e: mongodb::error::Error) -> Self {
        Error::Driver(e.to_string())
    }
}

impl MongoStore {
    pub fn new(db: Database, large_object_collection: impl Into<String>) -> Self {
        Self {
            db,
            large_object_collection: large_object_collection.into(),
        }
    }

    pub fn connect(uri: &str, db: &str, large_object_collection: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)?;
        Ok(Self::new(client.database(db), large_object_collection))
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

impl LargeObjectStore for MongoStore {
    fn put(&self, id: &str, content: Vec<u8>) -> Result<()> {
        let data = Binary {
            subtype: BinarySubtype::Generic,
            bytes: content,
        };
        self.collection(&self.large_object_collection)
            .insert_one(doc! {"_id": id, "data": data})
            .run()?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>> {
        let found = self
            .collection(&self.large_object_collection)
            .find_one(doc! {"_id": id})
            .run()?
            .ok_or_else(|| Error::LargeObjectNotFound(id.to_string()))?;
        match found.get("data") {
            Some(Bson::Binary(b)) => Ok(b.bytes.clone()),
            _ => Err(Error::MalformedLargeObject(id.to_string())),
        }
    }
}

impl DocumentStore for MongoStore {
    fn large_objects(&self) -> &dyn LargeObjectStore {
        self
    }

    fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<Document>> {
        let cursor = self.collection(collection).aggregate(pipeline).run()?;
        Ok(cursor.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    fn find_one(&self, collection: &str, filter: Document) -> Result<Option<Document>> {
        Ok(self.collection(collection).find_one(filter).run()?)
    }

    fn insert(&self, collection: &str, document: Document) -> Result<Bson> {
        Ok(self
            .collection(collection)
            .insert_one(document)
            .run()?
            .inserted_id)
    }

    fn update(&self, request: &UpdateRequest) -> Result<u64> {
        let coll = self.collection(&request.collection);
        let filter = request.filter.clone();
        let update = request.update.clone();
        let array_filters = request.array_filters.clone();
        let result = match (request.multi, array_filters.is_empty()) {
            (true, true) => coll.update_many(filter, update).run()?,
            (true, false) => coll
                .update_many(filter, update)
                .array_filters(array_filters)
                .run()?,
            (false, true) => coll.update_one(filter, update).run()?,
            (false, false) => coll
                .update_one(filter, update)
                .array_filters(array_filters)
                .run()?,
        };
        Ok(result.matched_count)
    }

    fn remove(&self, collection: &str, filter: Document) -> Result<u64> {
        Ok(self.collection(collection).delete_many(filter).run()?.deleted_count)
    }
}
