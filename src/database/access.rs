//! Collection-scoped data access used by the HTTP handlers.
//!
//! Every operation makes exactly one store call, logs `op() -->` on entry and
//! `op() <--` on completion, and hands the store's error back untouched.

use std::fmt::Display;
use std::sync::Arc;

use futures::TryStreamExt;
use serde_json::Value;
use tracing::{error, info};

use crate::database::store::{
    AggregateOptions, BulkOperation, BulkWriteResult, CountOptions, DocumentStore, FindOptions, IndexOptions,
    RemoveResult, StoreError,
};
use crate::filter::Document;

#[derive(Clone)]
pub struct DataAccess {
    store: Arc<dyn DocumentStore>,
}

/// Log the outcome of a store call and pass it through
fn finish<T>(op: &str, collection: &str, result: Result<T, StoreError>) -> Result<T, StoreError> {
    match &result {
        Ok(_) => info!("{}() <-- {}", op, collection),
        Err(e) => error!("{}() failed on {}: {}", op, collection, e),
    }
    result
}

fn enter(op: &str, collection: &str, detail: impl Display) {
    info!("{}() --> {} {}", op, collection, detail);
}

impl DataAccess {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    pub async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        enter("insert", collection, "");
        finish("insert", collection, self.store.insert(collection, document).await)
    }

    pub async fn save(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        enter("save", collection, "");
        finish("save", collection, self.store.save(collection, document).await)
    }

    pub async fn bulk_write(&self, collection: &str, operations: Vec<BulkOperation>) -> Result<BulkWriteResult, StoreError> {
        enter("bulkWrite", collection, format_args!("ops={}", operations.len()));
        finish("bulkWrite", collection, self.store.bulk_write(collection, operations).await)
    }

    pub async fn create_index(&self, collection: &str, keys: Document, options: IndexOptions) -> Result<(), StoreError> {
        enter("createIndex", collection, Value::Object(keys.clone()));
        finish("createIndex", collection, self.store.create_index(collection, keys, options).await)
    }

    pub async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError> {
        enter("dropIndex", collection, name);
        finish("dropIndex", collection, self.store.drop_index(collection, name).await)
    }

    pub async fn find_one(&self, collection: &str, query: Value, fields: Option<Value>) -> Result<Option<Document>, StoreError> {
        enter("findOne", collection, &query);
        finish("findOne", collection, self.store.find_one(collection, query, fields).await)
    }

    pub async fn find(&self, collection: &str, query: Value) -> Result<Vec<Document>, StoreError> {
        enter("find", collection, &query);
        finish("find", collection, self.store.find(collection, query, FindOptions::default()).await)
    }

    pub async fn find_with_options(&self, collection: &str, query: Value, options: FindOptions) -> Result<Vec<Document>, StoreError> {
        enter("findWithOptions", collection, &query);
        finish("findWithOptions", collection, self.store.find(collection, query, options).await)
    }

    pub async fn count(&self, collection: &str, query: Value) -> Result<u64, StoreError> {
        enter("count", collection, &query);
        finish("count", collection, self.store.count(collection, query, CountOptions::default()).await)
    }

    pub async fn count_with_options(&self, collection: &str, query: Value, options: CountOptions) -> Result<u64, StoreError> {
        enter("countWithOptions", collection, &query);
        finish("countWithOptions", collection, self.store.count(collection, query, options).await)
    }

    pub async fn aggregate(&self, collection: &str, pipeline: Vec<Value>) -> Result<Vec<Document>, StoreError> {
        self.run_aggregate("aggregate", collection, pipeline, AggregateOptions::default()).await
    }

    pub async fn aggregate_with_options(&self, collection: &str, pipeline: Vec<Value>, options: AggregateOptions) -> Result<Vec<Document>, StoreError> {
        self.run_aggregate("aggregateWithOptions", collection, pipeline, options).await
    }

    /// Buffer the stream in order; the first error item fails the whole call
    async fn run_aggregate(&self, op: &str, collection: &str, pipeline: Vec<Value>, options: AggregateOptions) -> Result<Vec<Document>, StoreError> {
        enter(op, collection, format_args!("stages={}", pipeline.len()));
        let result = match self.store.aggregate(collection, pipeline, options).await {
            Ok(stream) => stream.try_collect::<Vec<_>>().await,
            Err(e) => Err(e),
        };
        finish(op, collection, result)
    }

    pub async fn find_one_and_update(&self, collection: &str, query: Value, update: Value) -> Result<Option<Document>, StoreError> {
        enter("findOneAndUpdate", collection, &query);
        finish("findOneAndUpdate", collection, self.store.find_one_and_update(collection, query, update).await)
    }

    pub async fn find_one_and_delete(&self, collection: &str, query: Value) -> Result<Option<Document>, StoreError> {
        enter("findOneAndDelete", collection, &query);
        finish("findOneAndDelete", collection, self.store.find_one_and_delete(collection, query).await)
    }

    pub async fn remove_documents(&self, collection: &str, query: Value) -> Result<RemoveResult, StoreError> {
        enter("removeDocuments", collection, &query);
        finish("removeDocuments", collection, self.store.remove_documents(collection, query).await)
    }
}
