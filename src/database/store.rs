//! The document store contract implemented by every backend.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::filter::{Document, FilterError};

/// Backend failures. These reach callers unmodified so they can branch on the kind.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Duplicate key in collection '{collection}' on index '{index}'")]
    DuplicateKey { collection: String, index: String },

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Driver or connection failure reported by the backend
    #[error("{0}")]
    Backend(String),

    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Corrupt document in collection '{0}'")]
    CorruptDocument(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Projection, sort and paging for `find`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
    /// Projection document, e.g. `{"password": 0}`
    pub fields: Option<Value>,
    /// Sort spec, e.g. `{"createdAt": -1}` or `"rent desc"`
    pub sort: Option<Value>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn page(page: u64, limit: u64) -> Self {
        Self {
            skip: Some(page.saturating_sub(1).saturating_mul(limit)),
            limit: Some(limit),
            ..Default::default()
        }
    }

    pub fn with_fields(mut self, fields: Value) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountOptions {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl CountOptions {
    /// Apply skip/limit to a raw match count
    pub fn clamp(&self, total: u64) -> u64 {
        let remaining = total.saturating_sub(self.skip.unwrap_or(0));
        match self.limit {
            Some(limit) if limit > 0 => remaining.min(limit),
            _ => remaining,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    /// Server-side time budget for the whole pipeline
    pub max_time: Option<Duration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Defaults to `<field>_<dir>` joined by `_`
    pub name: Option<String>,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BulkOperation {
    Insert {
        document: Document,
    },
    Update {
        filter: Value,
        update: Value,
        #[serde(default)]
        upsert: bool,
        #[serde(default)]
        multi: bool,
    },
    Replace {
        filter: Value,
        document: Document,
        #[serde(default)]
        upsert: bool,
    },
    Delete {
        filter: Value,
        #[serde(default)]
        multi: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWriteResult {
    pub inserted_count: u64,
    pub matched_count: u64,
    pub modified_count: u64,
    pub deleted_count: u64,
    pub upserted_count: u64,
    pub upserted_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveResult {
    pub removed_count: u64,
}

/// Aggregation output, streamed in pipeline order
pub type DocumentStream = BoxStream<'static, Result<Document, StoreError>>;

/// Collection-scoped document operations.
///
/// Every call is independent; there is no cross-collection transaction.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    async fn ping(&self) -> Result<(), StoreError>;

    /// Insert a new document, generating `_id` when absent. Fails on an existing `_id`.
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    /// Insert, or replace the document with the same `_id`
    async fn save(&self, collection: &str, document: Document) -> Result<String, StoreError>;

    async fn bulk_write(&self, collection: &str, operations: Vec<BulkOperation>) -> Result<BulkWriteResult, StoreError>;

    async fn create_index(&self, collection: &str, keys: Document, options: IndexOptions) -> Result<(), StoreError>;

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError>;

    async fn find_one(&self, collection: &str, query: Value, fields: Option<Value>) -> Result<Option<Document>, StoreError>;

    async fn find(&self, collection: &str, query: Value, options: FindOptions) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, query: Value, options: CountOptions) -> Result<u64, StoreError>;

    async fn aggregate(&self, collection: &str, pipeline: Vec<Value>, options: AggregateOptions) -> Result<DocumentStream, StoreError>;

    /// Returns the document as it was before the update
    async fn find_one_and_update(&self, collection: &str, query: Value, update: Value) -> Result<Option<Document>, StoreError>;

    async fn find_one_and_delete(&self, collection: &str, query: Value) -> Result<Option<Document>, StoreError>;

    async fn remove_documents(&self, collection: &str, query: Value) -> Result<RemoveResult, StoreError>;
}

/// String form of a document id
pub fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ensure `_id` is set, generating a UUID when missing
pub fn assign_id(document: &mut Document) -> String {
    match document.get("_id") {
        Some(id) if !id.is_null() => id_string(id),
        _ => {
            let id = uuid::Uuid::new_v4().simple().to_string();
            document.insert("_id".to_string(), Value::String(id.clone()));
            id
        }
    }
}

/// Mongo-style default index name, e.g. `email_1_createdAt_-1`
pub fn default_index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(field, dir)| format!("{}_{}", field, dir.as_i64().unwrap_or(1)))
        .collect::<Vec<_>>()
        .join("_")
}
