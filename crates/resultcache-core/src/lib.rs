pub mod error;
pub mod schema;
pub mod settings;
pub mod types;

pub use error::{QueryError, Result};
pub use schema::{Field, Schema};
pub use settings::ExecutionSettings;
pub use types::DataType;
