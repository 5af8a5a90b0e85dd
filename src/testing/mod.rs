//! Store doubles for unit and router tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::database::store::{
    AggregateOptions, BulkOperation, BulkWriteResult, CountOptions, DocumentStore, DocumentStream, FindOptions,
    IndexOptions, RemoveResult, StoreError,
};
use crate::filter::Document;

/// Succeeds every call, counting them. `find`/`aggregate` return the canned documents.
#[derive(Default)]
pub struct CountingStore {
    calls: AtomicUsize,
    documents: Vec<Document>,
    fail_stream_after: Option<usize>,
}

impl CountingStore {
    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self { documents, ..Default::default() }
    }

    /// Make `aggregate` yield an error item after `n` documents
    pub fn fail_stream_after(mut self, n: usize) -> Self {
        self.fail_stream_after = Some(n);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    fn backend(&self) -> &'static str {
        "counting"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, _collection: &str, _document: Document) -> Result<String, StoreError> {
        self.tick();
        Ok("generated".to_string())
    }

    async fn save(&self, _collection: &str, _document: Document) -> Result<String, StoreError> {
        self.tick();
        Ok("saved".to_string())
    }

    async fn bulk_write(&self, _collection: &str, _operations: Vec<BulkOperation>) -> Result<BulkWriteResult, StoreError> {
        self.tick();
        Ok(BulkWriteResult::default())
    }

    async fn create_index(&self, _collection: &str, _keys: Document, _options: IndexOptions) -> Result<(), StoreError> {
        self.tick();
        Ok(())
    }

    async fn drop_index(&self, _collection: &str, _name: &str) -> Result<(), StoreError> {
        self.tick();
        Ok(())
    }

    async fn find_one(&self, _collection: &str, _query: Value, _fields: Option<Value>) -> Result<Option<Document>, StoreError> {
        self.tick();
        Ok(self.documents.first().cloned())
    }

    async fn find(&self, _collection: &str, _query: Value, _options: FindOptions) -> Result<Vec<Document>, StoreError> {
        self.tick();
        Ok(self.documents.clone())
    }

    async fn count(&self, _collection: &str, _query: Value, options: CountOptions) -> Result<u64, StoreError> {
        self.tick();
        Ok(options.clamp(self.documents.len() as u64))
    }

    async fn aggregate(&self, _collection: &str, _pipeline: Vec<Value>, _options: AggregateOptions) -> Result<DocumentStream, StoreError> {
        self.tick();
        let mut items: Vec<Result<Document, StoreError>> = self.documents.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_stream_after {
            items.truncate(n);
            items.push(Err(StoreError::Timeout("stream interrupted".to_string())));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn find_one_and_update(&self, _collection: &str, _query: Value, _update: Value) -> Result<Option<Document>, StoreError> {
        self.tick();
        Ok(self.documents.first().cloned())
    }

    async fn find_one_and_delete(&self, _collection: &str, _query: Value) -> Result<Option<Document>, StoreError> {
        self.tick();
        Ok(self.documents.first().cloned())
    }

    async fn remove_documents(&self, _collection: &str, _query: Value) -> Result<RemoveResult, StoreError> {
        self.tick();
        Ok(RemoveResult { removed_count: self.documents.len() as u64 })
    }
}

/// Fails every call with the same message
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    pub fn new(message: &str) -> Self {
        Self { message: message.to_string() }
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::Backend(self.message.clone()))
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    fn backend(&self) -> &'static str {
        "failing"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.fail()
    }

    async fn insert(&self, _collection: &str, _document: Document) -> Result<String, StoreError> {
        self.fail()
    }

    async fn save(&self, _collection: &str, _document: Document) -> Result<String, StoreError> {
        self.fail()
    }

    async fn bulk_write(&self, _collection: &str, _operations: Vec<BulkOperation>) -> Result<BulkWriteResult, StoreError> {
        self.fail()
    }

    async fn create_index(&self, _collection: &str, _keys: Document, _options: IndexOptions) -> Result<(), StoreError> {
        self.fail()
    }

    async fn drop_index(&self, _collection: &str, _name: &str) -> Result<(), StoreError> {
        self.fail()
    }

    async fn find_one(&self, _collection: &str, _query: Value, _fields: Option<Value>) -> Result<Option<Document>, StoreError> {
        self.fail()
    }

    async fn find(&self, _collection: &str, _query: Value, _options: FindOptions) -> Result<Vec<Document>, StoreError> {
        self.fail()
    }

    async fn count(&self, _collection: &str, _query: Value, _options: CountOptions) -> Result<u64, StoreError> {
        self.fail()
    }

    async fn aggregate(&self, _collection: &str, _pipeline: Vec<Value>, _options: AggregateOptions) -> Result<DocumentStream, StoreError> {
        self.fail()
    }

    async fn find_one_and_update(&self, _collection: &str, _query: Value, _update: Value) -> Result<Option<Document>, StoreError> {
        self.fail()
    }

    async fn find_one_and_delete(&self, _collection: &str, _query: Value) -> Result<Option<Document>, StoreError> {
        self.fail()
    }

    async fn remove_documents(&self, _collection: &str, _query: Value) -> Result<RemoveResult, StoreError> {
        self.fail()
    }
}
