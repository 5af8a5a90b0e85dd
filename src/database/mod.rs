pub mod access;
pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use access::DataAccess;
pub use manager::DatabaseManager;
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;
pub use store::{
    AggregateOptions, BulkOperation, BulkWriteResult, CountOptions, DocumentStore, FindOptions, IndexOptions,
    RemoveResult, StoreError,
};
