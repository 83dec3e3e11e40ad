use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
