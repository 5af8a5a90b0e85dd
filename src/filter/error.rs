use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid query document: {0}")]
    InvalidQuery(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid operator data: {0}")]
    InvalidOperatorData(String),

    #[error("Invalid sort specification: {0}")]
    InvalidSort(String),

    #[error("Invalid update document: {0}")]
    InvalidUpdate(String),

    #[error("Invalid pipeline stage: {0}")]
    InvalidStage(String),
}
