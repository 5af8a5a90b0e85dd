//! Mongo-style query language shared by the document store backends.
//!
//! Filter documents, sort specs, projections, update documents and
//! aggregation pipelines are plain JSON. `matcher`, `update`, `projection`
//! and `pipeline` evaluate them in memory; `filter_where` and `filter_order`
//! compile them to parameterised SQL over JSONB columns.

pub mod error;
pub mod filter_order;
pub mod filter_where;
pub mod matcher;
pub mod pipeline;
pub mod projection;
pub mod types;
pub mod update;

pub use error::FilterError;
pub use types::*;
