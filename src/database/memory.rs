//! In-process document store.
//!
//! Collections keep insertion order, which is the natural order returned by
//! unsorted reads. Used for local runs and as the default test backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::database::store::{
    assign_id, default_index_name, AggregateOptions, BulkOperation, BulkWriteResult, CountOptions, DocumentStore,
    DocumentStream, FindOptions, IndexOptions, RemoveResult, StoreError,
};
use crate::filter::filter_order::FilterOrder;
use crate::filter::filter_where::{Condition, FilterWhere};
use crate::filter::matcher::{lookup, matches, values_equal};
use crate::filter::pipeline::Pipeline;
use crate::filter::projection::Projection;
use crate::filter::update::Update;
use crate::filter::{field_path, validate_collection_name, Document, FilterError};

#[derive(Debug, Clone)]
struct IndexSpec {
    fields: Vec<String>,
    unique: bool,
}

/// Values of `fields` in `doc`, or `None` when any field is absent
fn index_key<'a>(doc: &'a Document, fields: &[String]) -> Option<Vec<&'a Value>> {
    fields.iter().map(|field| lookup(doc, field)).collect()
}

#[derive(Debug, Clone, Default)]
struct Collection {
    docs: Vec<Document>,
    indexes: BTreeMap<String, IndexSpec>,
}

impl Collection {
    fn position(&self, condition: &Condition) -> Option<usize> {
        self.docs.iter().position(|d| matches(condition, d))
    }

    fn position_of_id(&self, id: &Value) -> Option<usize> {
        self.docs
            .iter()
            .position(|d| d.get("_id").is_some_and(|existing| values_equal(existing, id)))
    }

    /// Reject `candidate` if a unique index already holds its key (ignoring the doc at `skip`).
    /// Documents missing any indexed field are left out of the index, so they never clash.
    fn check_unique(&self, collection: &str, candidate: &Document, skip: Option<usize>) -> Result<(), StoreError> {
        for (name, spec) in self.indexes.iter().filter(|(_, spec)| spec.unique) {
            let Some(key) = index_key(candidate, &spec.fields) else {
                continue;
            };
            let clash = self.docs.iter().enumerate().any(|(i, existing)| {
                Some(i) != skip
                    && index_key(existing, &spec.fields).is_some_and(|other| {
                        key.iter().zip(&other).all(|(left, right)| values_equal(left, right))
                    })
            });
            if clash {
                return Err(StoreError::DuplicateKey { collection: collection.to_string(), index: name.clone() });
            }
        }
        Ok(())
    }

    fn insert(&mut self, collection: &str, mut document: Document) -> Result<String, StoreError> {
        let id = assign_id(&mut document);
        if let Some(existing) = document.get("_id") {
            if self.position_of_id(existing).is_some() {
                return Err(StoreError::DuplicateKey { collection: collection.to_string(), index: "_id_".to_string() });
            }
        }
        self.check_unique(collection, &document, None)?;
        self.docs.push(document);
        Ok(id)
    }

    fn replace_at(&mut self, collection: &str, index: usize, document: Document) -> Result<(), StoreError> {
        self.check_unique(collection, &document, Some(index))?;
        self.docs[index] = document;
        Ok(())
    }

    fn apply_bulk(&mut self, collection: &str, op: BulkOperation, result: &mut BulkWriteResult) -> Result<(), StoreError> {
        match op {
            BulkOperation::Insert { document } => {
                self.insert(collection, document)?;
                result.inserted_count += 1;
            }
            BulkOperation::Update { filter, update, upsert, multi } => {
                let condition = FilterWhere::parse(&filter)?;
                let update = Update::parse(&update)?;
                let targets: Vec<usize> = self
                    .docs
                    .iter()
                    .enumerate()
                    .filter(|(_, d)| matches(&condition, d))
                    .map(|(i, _)| i)
                    .take(if multi { usize::MAX } else { 1 })
                    .collect();
                if targets.is_empty() && upsert {
                    let id = self.insert(collection, update.seed(&filter)?)?;
                    result.upserted_count += 1;
                    result.upserted_ids.push(id);
                }
                for index in targets {
                    result.matched_count += 1;
                    let updated = update.apply(&self.docs[index])?;
                    if updated != self.docs[index] {
                        self.replace_at(collection, index, updated)?;
                        result.modified_count += 1;
                    }
                }
            }
            BulkOperation::Replace { filter, document, upsert } => {
                let condition = FilterWhere::parse(&filter)?;
                match self.position(&condition) {
                    Some(index) => {
                        result.matched_count += 1;
                        let updated = Update::Replace(document).apply(&self.docs[index])?;
                        if updated != self.docs[index] {
                            self.replace_at(collection, index, updated)?;
                            result.modified_count += 1;
                        }
                    }
                    None if upsert => {
                        let id = self.insert(collection, document)?;
                        result.upserted_count += 1;
                        result.upserted_ids.push(id);
                    }
                    None => {}
                }
            }
            BulkOperation::Delete { filter, multi } => {
                let condition = FilterWhere::parse(&filter)?;
                if multi {
                    let before = self.docs.len();
                    self.docs.retain(|d| !matches(&condition, d));
                    result.deleted_count += (before - self.docs.len()) as u64;
                } else if let Some(index) = self.position(&condition) {
                    self.docs.remove(index);
                    result.deleted_count += 1;
                }
            }
        }
        Ok(())
    }
}

/// Collections held in memory behind an async `RwLock`
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        validate_collection_name(collection)?;
        let mut collections = self.collections.write().await;
        collections.entry(collection.to_string()).or_default().insert(collection, document)
    }

    async fn save(&self, collection: &str, mut document: Document) -> Result<String, StoreError> {
        validate_collection_name(collection)?;
        let id = assign_id(&mut document);
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        let existing = document.get("_id").and_then(|v| coll.position_of_id(v));
        match existing {
            Some(index) => coll.replace_at(collection, index, document)?,
            None => {
                coll.insert(collection, document)?;
            }
        }
        Ok(id)
    }

    async fn bulk_write(&self, collection: &str, operations: Vec<BulkOperation>) -> Result<BulkWriteResult, StoreError> {
        validate_collection_name(collection)?;
        let mut collections = self.collections.write().await;
        // Work on a copy so a failing operation leaves the collection untouched
        let mut working = collections.get(collection).cloned().unwrap_or_default();
        let mut result = BulkWriteResult::default();
        for op in operations {
            working.apply_bulk(collection, op, &mut result)?;
        }
        collections.insert(collection.to_string(), working);
        Ok(result)
    }

    async fn create_index(&self, collection: &str, keys: Document, options: IndexOptions) -> Result<(), StoreError> {
        validate_collection_name(collection)?;
        if keys.is_empty() {
            return Err(FilterError::InvalidQuery("index keys cannot be empty".to_string()).into());
        }
        for (field, dir) in &keys {
            field_path(field)?;
            if !matches!(dir.as_i64(), Some(1) | Some(-1)) {
                return Err(FilterError::InvalidQuery(format!("index direction for '{}' must be 1 or -1", field)).into());
            }
        }
        let name = options.name.clone().unwrap_or_else(|| default_index_name(&keys));
        let spec = IndexSpec { fields: keys.keys().cloned().collect(), unique: options.unique };

        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();
        if coll.indexes.contains_key(&name) {
            return Ok(());
        }
        coll.indexes.insert(name.clone(), spec);
        if options.unique {
            // Existing documents must already satisfy the constraint
            let violation = (0..coll.docs.len()).find_map(|i| coll.check_unique(collection, &coll.docs[i], Some(i)).err());
            if let Some(err) = violation {
                coll.indexes.remove(&name);
                return Err(err);
            }
        }
        info!("Created index {} on {}", name, collection);
        Ok(())
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .get_mut(collection)
            .and_then(|coll| coll.indexes.remove(name))
            .map(|_| ())
            .ok_or_else(|| StoreError::IndexNotFound(name.to_string()))
    }

    async fn find_one(&self, collection: &str, query: Value, fields: Option<Value>) -> Result<Option<Document>, StoreError> {
        let condition = FilterWhere::parse(&query)?;
        let projection = Projection::parse(fields.as_ref().unwrap_or(&Value::Null))?;
        let collections = self.collections.read().await;
        let found = collections
            .get(collection)
            .and_then(|coll| coll.docs.iter().find(|d| matches(&condition, d)));
        Ok(found.map(|d| match &projection {
            Some(p) => p.apply(d),
            None => d.clone(),
        }))
    }

    async fn find(&self, collection: &str, query: Value, options: FindOptions) -> Result<Vec<Document>, StoreError> {
        let condition = FilterWhere::parse(&query)?;
        let projection = Projection::parse(options.fields.as_ref().unwrap_or(&Value::Null))?;
        let order = FilterOrder::validate_and_parse(options.sort.as_ref().unwrap_or(&Value::Null))?;

        let mut docs: Vec<Document> = {
            let collections = self.collections.read().await;
            collections
                .get(collection)
                .map(|coll| coll.docs.iter().filter(|d| matches(&condition, d)).cloned().collect())
                .unwrap_or_default()
        };
        FilterOrder::sort_documents(&mut docs, &order);

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.filter(|l| *l > 0).map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| match &projection {
                Some(p) => p.apply(&d),
                None => d,
            })
            .collect())
    }

    async fn count(&self, collection: &str, query: Value, options: CountOptions) -> Result<u64, StoreError> {
        let condition = FilterWhere::parse(&query)?;
        let collections = self.collections.read().await;
        let total = collections
            .get(collection)
            .map(|coll| coll.docs.iter().filter(|d| matches(&condition, d)).count() as u64)
            .unwrap_or(0);
        Ok(options.clamp(total))
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Value>, _options: AggregateOptions) -> Result<DocumentStream, StoreError> {
        // Evaluation is synchronous, so max_time never trips here
        let pipeline = Pipeline::parse(&pipeline)?;
        let snapshot = {
            let collections = self.collections.read().await;
            collections.get(collection).map(|coll| coll.docs.clone()).unwrap_or_default()
        };
        let output = pipeline.run(snapshot);
        Ok(stream::iter(output.into_iter().map(Ok)).boxed())
    }

    async fn find_one_and_update(&self, collection: &str, query: Value, update: Value) -> Result<Option<Document>, StoreError> {
        let condition = FilterWhere::parse(&query)?;
        let update = Update::parse(&update)?;
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = coll.position(&condition) else {
            return Ok(None);
        };
        let original = coll.docs[index].clone();
        let updated = update.apply(&original)?;
        coll.replace_at(collection, index, updated)?;
        Ok(Some(original))
    }

    async fn find_one_and_delete(&self, collection: &str, query: Value) -> Result<Option<Document>, StoreError> {
        let condition = FilterWhere::parse(&query)?;
        let mut collections = self.collections.write().await;
        Ok(collections.get_mut(collection).and_then(|coll| {
            let index = coll.position(&condition)?;
            Some(coll.docs.remove(index))
        }))
    }

    async fn remove_documents(&self, collection: &str, query: Value) -> Result<RemoveResult, StoreError> {
        let condition = FilterWhere::parse(&query)?;
        let mut collections = self.collections.write().await;
        let removed_count = match collections.get_mut(collection) {
            Some(coll) => {
                let before = coll.docs.len();
                coll.docs.retain(|d| !matches(&condition, d));
                (before - coll.docs.len()) as u64
            }
            None => 0,
        };
        Ok(RemoveResult { removed_count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (name, rent) in [("Block A", 1200), ("Block B", 800), ("Block C", 1500)] {
            store.insert("houses", doc(json!({"name": name, "rent": rent}))).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn insert_generates_ids_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let id = store.insert("users", doc(json!({"username": "ann"}))).await.unwrap();
        let again = store.insert("users", doc(json!({"_id": id, "username": "bob"}))).await;
        assert!(matches!(again, Err(StoreError::DuplicateKey { .. })));
        assert!(matches!(
            store.insert("bad name", Document::new()).await,
            Err(StoreError::Filter(FilterError::InvalidCollectionName(_)))
        ));
    }

    #[tokio::test]
    async fn save_upserts_by_id() {
        let store = MemoryStore::new();
        let id = store.save("tenants", doc(json!({"_id": "t1", "name": "Ann"}))).await.unwrap();
        assert_eq!(id, "t1");
        store.save("tenants", doc(json!({"_id": "t1", "name": "Ann K"}))).await.unwrap();
        let all = store.find("tenants", json!({}), FindOptions::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["name"], json!("Ann K"));
    }

    #[tokio::test]
    async fn find_with_options_sorts_pages_and_projects() {
        let store = seeded().await;
        let options = FindOptions { skip: Some(1), limit: Some(1), ..Default::default() }
            .with_sort(json!({"rent": -1}))
            .with_fields(json!({"name": 1, "_id": 0}));
        let out = store.find("houses", json!({}), options).await.unwrap();
        assert_eq!(out, vec![doc(json!({"name": "Block A"}))]);
    }

    #[tokio::test]
    async fn count_honours_options() {
        let store = seeded().await;
        assert_eq!(store.count("houses", json!({"rent": {"$gte": 1000}}), CountOptions::default()).await.unwrap(), 2);
        let capped = CountOptions { skip: None, limit: Some(1) };
        assert_eq!(store.count("houses", json!({}), capped).await.unwrap(), 1);
        assert_eq!(store.count("nothing", json!({}), CountOptions::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unique_indexes_are_enforced() {
        let store = MemoryStore::new();
        let keys = doc(json!({"email": 1}));
        store.create_index("users", keys, IndexOptions { name: None, unique: true }).await.unwrap();
        store.insert("users", doc(json!({"email": "a@x.io"}))).await.unwrap();
        let dup = store.insert("users", doc(json!({"email": "a@x.io"}))).await;
        assert!(matches!(dup, Err(StoreError::DuplicateKey { ref index, .. }) if index == "email_1"));

        store.drop_index("users", "email_1").await.unwrap();
        store.insert("users", doc(json!({"email": "a@x.io"}))).await.unwrap();
        assert!(matches!(store.drop_index("users", "email_1").await, Err(StoreError::IndexNotFound(_))));
    }

    #[tokio::test]
    async fn unique_indexes_skip_documents_without_the_key() {
        let store = MemoryStore::new();
        store.create_index("users", doc(json!({"username": 1})), IndexOptions { name: None, unique: true }).await.unwrap();
        store.insert("users", doc(json!({"email": "a@x.io"}))).await.unwrap();
        store.insert("users", doc(json!({"email": "b@x.io"}))).await.unwrap();

        store.insert("users", doc(json!({"username": null}))).await.unwrap();
        let dup = store.insert("users", doc(json!({"username": null}))).await;
        assert!(matches!(dup, Err(StoreError::DuplicateKey { .. })));
    }

    #[tokio::test]
    async fn unique_index_creation_fails_on_existing_duplicates() {
        let store = MemoryStore::new();
        store.insert("users", doc(json!({"email": "a@x.io"}))).await.unwrap();
        store.insert("users", doc(json!({"email": "a@x.io"}))).await.unwrap();
        let created = store
            .create_index("users", doc(json!({"email": 1})), IndexOptions { name: None, unique: true })
            .await;
        assert!(matches!(created, Err(StoreError::DuplicateKey { .. })));
        // the failed index is not left behind
        store.insert("users", doc(json!({"email": "a@x.io"}))).await.unwrap();
    }

    #[tokio::test]
    async fn find_one_and_update_returns_original() {
        let store = seeded().await;
        let before = store
            .find_one_and_update("houses", json!({"name": "Block B"}), json!({"$inc": {"rent": 100}}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before["rent"], json!(800));
        let after = store.find_one("houses", json!({"name": "Block B"}), None).await.unwrap().unwrap();
        assert_eq!(after["rent"], json!(900));
        assert!(store
            .find_one_and_update("houses", json!({"name": "none"}), json!({"$set": {"a": 1}}))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn deletes() {
        let store = seeded().await;
        let gone = store.find_one_and_delete("houses", json!({"name": "Block A"})).await.unwrap();
        assert_eq!(gone.unwrap()["rent"], json!(1200));
        let removed = store.remove_documents("houses", json!({"rent": {"$lt": 2000}})).await.unwrap();
        assert_eq!(removed.removed_count, 2);
        assert!(store.find_one("houses", json!({}), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn aggregate_streams_pipeline_output_in_order() {
        let store = seeded().await;
        let stream = store
            .aggregate(
                "houses",
                vec![json!({"$match": {"rent": {"$gt": 900}}}), json!({"$sort": {"rent": 1}})],
                AggregateOptions::default(),
            )
            .await
            .unwrap();
        let docs: Vec<Document> = stream.try_collect().await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d["name"].clone()).collect();
        assert_eq!(names, vec![json!("Block A"), json!("Block C")]);
    }

    #[tokio::test]
    async fn bulk_write_is_all_or_nothing() {
        let store = MemoryStore::new();
        let ops = vec![
            BulkOperation::Insert { document: doc(json!({"_id": "p1", "amount": 10})) },
            BulkOperation::Update {
                filter: json!({"_id": "p1"}),
                update: json!({"$inc": {"amount": 5}}),
                upsert: false,
                multi: false,
            },
            BulkOperation::Update {
                filter: json!({"_id": "p2"}),
                update: json!({"$set": {"amount": 1}}),
                upsert: true,
                multi: false,
            },
            BulkOperation::Delete { filter: json!({"amount": 1}), multi: true },
        ];
        let result = store.bulk_write("payments", ops).await.unwrap();
        assert_eq!(result.inserted_count, 1);
        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);
        assert_eq!(result.upserted_ids, vec!["p2".to_string()]);
        assert_eq!(result.deleted_count, 1);

        let failing = vec![
            BulkOperation::Insert { document: doc(json!({"_id": "p3"})) },
            BulkOperation::Insert { document: doc(json!({"_id": "p1"})) },
        ];
        assert!(store.bulk_write("payments", failing).await.is_err());
        assert_eq!(store.count("payments", json!({}), CountOptions::default()).await.unwrap(), 1);
    }
}
