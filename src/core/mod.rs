pub mod error;
pub mod value;

pub use error::{ModelError, Result, SchemaError};
pub use value::{AttributeValue, ValueKind};
