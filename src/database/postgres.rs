//! PostgreSQL-backed document store.
//!
//! Each collection is a table `(id TEXT PRIMARY KEY, doc JSONB, seq BIGSERIAL)`
//! created on first use. Filters and sorts compile to SQL over `doc`;
//! projections, update operators and post-`$match` pipeline stages run in
//! process on the fetched documents.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use tokio::sync::RwLock;
use tracing::info;

use crate::database::store::{
    assign_id, default_index_name, AggregateOptions, BulkOperation, BulkWriteResult, CountOptions, DocumentStore,
    DocumentStream, FindOptions, IndexOptions, RemoveResult, StoreError,
};
use crate::filter::filter_order::FilterOrder;
use crate::filter::filter_where::FilterWhere;
use crate::filter::pipeline::Pipeline;
use crate::filter::projection::Projection;
use crate::filter::update::Update;
use crate::filter::{field_path, validate_collection_name, Document, FilterError, SqlParam, SqlResult};

const UNIQUE_VIOLATION: &str = "23505";
const UNDEFINED_OBJECT: &str = "42704";

pub struct PgDocumentStore {
    pool: PgPool,
    known_tables: RwLock<HashSet<String>>,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, known_tables: RwLock::new(HashSet::new()) }
    }

    /// Quote SQL identifier to prevent injection
    fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    async fn ensure_collection(&self, collection: &str) -> Result<String, StoreError> {
        validate_collection_name(collection)?;
        let table = Self::quote_identifier(collection);
        {
            let known = self.known_tables.read().await;
            if known.contains(collection) {
                return Ok(table);
            }
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc JSONB NOT NULL, seq BIGSERIAL)",
            table
        );
        sqlx::query(&ddl).execute(&self.pool).await?;
        self.known_tables.write().await.insert(collection.to_string());
        info!("Ensured collection table: {}", collection);
        Ok(table)
    }
}

/// Compile a filter into `SELECT ... WHERE ...` with the natural order as fallback
fn select_sql(table: &str, columns: &str, query: &Value, order: &Value, skip: Option<u64>, limit: Option<u64>, lock: bool) -> Result<SqlResult, StoreError> {
    let (where_clause, mut params) = FilterWhere::generate(query, 0)?;
    let infos = FilterOrder::validate_and_parse(order)?;
    let (order_clause, order_params) = FilterOrder::generate(&infos, params.len());
    params.extend(order_params);

    let order_clause = if order_clause.is_empty() {
        "ORDER BY seq ASC".to_string()
    } else {
        format!("{}, seq ASC", order_clause)
    };
    let limit_clause = match (limit.filter(|l| *l > 0), skip.filter(|s| *s > 0)) {
        (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
        (Some(l), None) => format!("LIMIT {}", l),
        (None, Some(o)) => format!("OFFSET {}", o),
        (None, None) => String::new(),
    };

    let query = [
        format!("SELECT {} FROM {}", columns, table),
        format!("WHERE {}", where_clause),
        order_clause,
        limit_clause,
        if lock { "FOR UPDATE".to_string() } else { String::new() },
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ");

    Ok(SqlResult { query, params })
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, Postgres, PgArguments>,
    p: &SqlParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match p {
        SqlParam::Json(v) => q.bind(Json(v.clone())),
        SqlParam::Path(parts) => q.bind(parts.clone()),
    }
}

fn bound(sql: &SqlResult) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    sql.params.iter().fold(sqlx::query(&sql.query), bind_param)
}

fn decode_doc(row: &PgRow, collection: &str) -> Result<Document, StoreError> {
    let Json(value): Json<Value> = row.try_get("doc")?;
    match value {
        Value::Object(doc) => Ok(doc),
        _ => Err(StoreError::CorruptDocument(collection.to_string())),
    }
}

/// Unique violations become `DuplicateKey`; everything else passes through
fn map_write_error(err: sqlx::Error, collection: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let index = db
                .constraint()
                .map(|c| c.trim_start_matches(&format!("{}__", collection)).to_string())
                .unwrap_or_else(|| "_id_".to_string());
            return StoreError::DuplicateKey { collection: collection.to_string(), index };
        }
    }
    StoreError::Sqlx(err)
}

async fn insert_doc(conn: &mut PgConnection, table: &str, collection: &str, mut document: Document) -> Result<String, StoreError> {
    let id = assign_id(&mut document);
    let sql = format!("INSERT INTO {} (id, doc) VALUES ($1, $2)", table);
    sqlx::query(&sql)
        .bind(&id)
        .bind(Json(Value::Object(document)))
        .execute(conn)
        .await
        .map_err(|e| map_write_error(e, collection))?;
    Ok(id)
}

async fn replace_doc(conn: &mut PgConnection, table: &str, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
    let sql = format!("UPDATE {} SET doc = $1 WHERE id = $2", table);
    sqlx::query(&sql)
        .bind(Json(Value::Object(document)))
        .bind(id)
        .execute(conn)
        .await
        .map_err(|e| map_write_error(e, collection))?;
    Ok(())
}

/// Lock and return `(id, doc)` for the first (or every, when `multi`) match
async fn select_for_update(conn: &mut PgConnection, table: &str, collection: &str, filter: &Value, multi: bool) -> Result<Vec<(String, Document)>, StoreError> {
    let limit = if multi { None } else { Some(1) };
    let sql = select_sql(table, "id, doc", filter, &Value::Null, None, limit, true)?;
    let rows = bound(&sql).fetch_all(conn).await?;
    rows.iter()
        .map(|row| Ok((row.try_get::<String, _>("id")?, decode_doc(row, collection)?)))
        .collect()
}

async fn apply_bulk(conn: &mut PgConnection, table: &str, collection: &str, op: BulkOperation, result: &mut BulkWriteResult) -> Result<(), StoreError> {
    match op {
        BulkOperation::Insert { document } => {
            insert_doc(conn, table, collection, document).await?;
            result.inserted_count += 1;
        }
        BulkOperation::Update { filter, update, upsert, multi } => {
            let update = Update::parse(&update)?;
            let targets = select_for_update(&mut *conn, table, collection, &filter, multi).await?;
            if targets.is_empty() && upsert {
                let id = insert_doc(&mut *conn, table, collection, update.seed(&filter)?).await?;
                result.upserted_count += 1;
                result.upserted_ids.push(id);
            }
            for (id, original) in targets {
                result.matched_count += 1;
                let updated = update.apply(&original)?;
                if updated != original {
                    replace_doc(&mut *conn, table, collection, &id, updated).await?;
                    result.modified_count += 1;
                }
            }
        }
        BulkOperation::Replace { filter, document, upsert } => {
            let targets = select_for_update(&mut *conn, table, collection, &filter, false).await?;
            match targets.into_iter().next() {
                Some((id, original)) => {
                    result.matched_count += 1;
                    let updated = Update::Replace(document).apply(&original)?;
                    if updated != original {
                        replace_doc(&mut *conn, table, collection, &id, updated).await?;
                        result.modified_count += 1;
                    }
                }
                None if upsert => {
                    let id = insert_doc(&mut *conn, table, collection, document).await?;
                    result.upserted_count += 1;
                    result.upserted_ids.push(id);
                }
                None => {}
            }
        }
        BulkOperation::Delete { filter, multi } => {
            let (where_clause, params) = FilterWhere::generate(&filter, 0)?;
            let query = if multi {
                format!("DELETE FROM {} WHERE {}", table, where_clause)
            } else {
                format!(
                    "DELETE FROM {0} WHERE id = (SELECT id FROM {0} WHERE {1} ORDER BY seq ASC LIMIT 1)",
                    table, where_clause
                )
            };
            let sql = SqlResult { query, params };
            let done = bound(&sql).execute(conn).await?;
            result.deleted_count += done.rows_affected();
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        let table = self.ensure_collection(collection).await?;
        let mut conn = self.pool.acquire().await?;
        insert_doc(&mut conn, &table, collection, document).await
    }

    async fn save(&self, collection: &str, mut document: Document) -> Result<String, StoreError> {
        let table = self.ensure_collection(collection).await?;
        let id = assign_id(&mut document);
        let sql = format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2) ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
            table
        );
        sqlx::query(&sql)
            .bind(&id)
            .bind(Json(Value::Object(document)))
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, collection))?;
        Ok(id)
    }

    async fn bulk_write(&self, collection: &str, operations: Vec<BulkOperation>) -> Result<BulkWriteResult, StoreError> {
        let table = self.ensure_collection(collection).await?;
        let mut tx = self.pool.begin().await?;
        let mut result = BulkWriteResult::default();
        for op in operations {
            // Dropping the transaction on error rolls everything back
            apply_bulk(&mut tx, &table, collection, op, &mut result).await?;
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn create_index(&self, collection: &str, keys: Document, options: IndexOptions) -> Result<(), StoreError> {
        let table = self.ensure_collection(collection).await?;
        if keys.is_empty() {
            return Err(FilterError::InvalidQuery("index keys cannot be empty".to_string()).into());
        }
        let mut columns = Vec::new();
        for (field, dir) in &keys {
            // Validated segments are [A-Za-z0-9_] only, so inlining the path literal is safe
            let path = field_path(field)?;
            let direction = match dir.as_i64() {
                Some(1) => "ASC",
                Some(-1) => "DESC",
                _ => {
                    return Err(FilterError::InvalidQuery(format!("index direction for '{}' must be 1 or -1", field)).into())
                }
            };
            columns.push(format!("(doc #> '{{{}}}') {}", path.join(","), direction));
        }

        let name = options.name.clone().unwrap_or_else(|| default_index_name(&keys));
        let ddl = format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if options.unique { "UNIQUE " } else { "" },
            Self::quote_identifier(&format!("{}__{}", collection, name)),
            table,
            columns.join(", ")
        );
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, collection))?;
        info!("Created index {} on {}", name, collection);
        Ok(())
    }

    async fn drop_index(&self, collection: &str, name: &str) -> Result<(), StoreError> {
        validate_collection_name(collection)?;
        let ddl = format!("DROP INDEX {}", Self::quote_identifier(&format!("{}__{}", collection, name)));
        match sqlx::query(&ddl).execute(&self.pool).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(UNDEFINED_OBJECT) => {
                Err(StoreError::IndexNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_one(&self, collection: &str, query: Value, fields: Option<Value>) -> Result<Option<Document>, StoreError> {
        let options = FindOptions { fields, limit: Some(1), ..Default::default() };
        Ok(self.find(collection, query, options).await?.into_iter().next())
    }

    async fn find(&self, collection: &str, query: Value, options: FindOptions) -> Result<Vec<Document>, StoreError> {
        let projection = Projection::parse(options.fields.as_ref().unwrap_or(&Value::Null))?;
        let table = self.ensure_collection(collection).await?;
        let order = options.sort.clone().unwrap_or(Value::Null);
        let sql = select_sql(&table, "doc", &query, &order, options.skip, options.limit, false)?;
        let rows = bound(&sql).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let doc = decode_doc(row, collection)?;
                Ok(match &projection {
                    Some(p) => p.apply(&doc),
                    None => doc,
                })
            })
            .collect()
    }

    async fn count(&self, collection: &str, query: Value, options: CountOptions) -> Result<u64, StoreError> {
        let table = self.ensure_collection(collection).await?;
        let (where_clause, params) = FilterWhere::generate(&query, 0)?;
        let sql = SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM {} WHERE {}", table, where_clause),
            params,
        };
        let row = bound(&sql).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(options.clamp(count.max(0) as u64))
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Value>, options: AggregateOptions) -> Result<DocumentStream, StoreError> {
        let pipeline = Pipeline::parse(&pipeline)?;
        let table = self.ensure_collection(collection).await?;
        let filter = pipeline.leading_match().cloned().unwrap_or(Value::Null);
        let sql = select_sql(&table, "doc", &filter, &Value::Null, None, None, false)?;

        let fetch = bound(&sql).fetch_all(&self.pool);
        let rows = match options.max_time {
            Some(budget) => tokio::time::timeout(budget, fetch)
                .await
                .map_err(|_| StoreError::Timeout(format!("aggregate on '{}' exceeded {:?}", collection, budget)))??,
            None => fetch.await?,
        };
        let docs = rows.iter().map(|row| decode_doc(row, collection)).collect::<Result<Vec<_>, _>>()?;
        let output = pipeline.without_leading_match().run(docs);
        Ok(stream::iter(output.into_iter().map(Ok)).boxed())
    }

    async fn find_one_and_update(&self, collection: &str, query: Value, update: Value) -> Result<Option<Document>, StoreError> {
        let update = Update::parse(&update)?;
        let table = self.ensure_collection(collection).await?;
        let mut tx = self.pool.begin().await?;
        let Some((id, original)) = select_for_update(&mut tx, &table, collection, &query, false).await?.into_iter().next() else {
            return Ok(None);
        };
        let updated = update.apply(&original)?;
        replace_doc(&mut tx, &table, collection, &id, updated).await?;
        tx.commit().await?;
        Ok(Some(original))
    }

    async fn find_one_and_delete(&self, collection: &str, query: Value) -> Result<Option<Document>, StoreError> {
        let table = self.ensure_collection(collection).await?;
        let (where_clause, params) = FilterWhere::generate(&query, 0)?;
        let sql = SqlResult {
            query: format!(
                "DELETE FROM {0} WHERE id = (SELECT id FROM {0} WHERE {1} ORDER BY seq ASC LIMIT 1 FOR UPDATE) RETURNING doc",
                table, where_clause
            ),
            params,
        };
        let row = bound(&sql).fetch_optional(&self.pool).await?;
        row.map(|r| decode_doc(&r, collection)).transpose()
    }

    async fn remove_documents(&self, collection: &str, query: Value) -> Result<RemoveResult, StoreError> {
        let table = self.ensure_collection(collection).await?;
        let (where_clause, params) = FilterWhere::generate(&query, 0)?;
        let sql = SqlResult { query: format!("DELETE FROM {} WHERE {}", table, where_clause), params };
        let done = bound(&sql).execute(&self.pool).await?;
        Ok(RemoveResult { removed_count: done.rows_affected() })
    }
}
