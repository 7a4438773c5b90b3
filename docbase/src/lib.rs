pub mod schema;
pub mod command;
pub mod migration;
pub mod queue;
pub mod store;
pub mod error;

pub use error::{DocbaseError, Result};
pub use schema::{ColumnSpec, DocumentSchema, ScalarType, TypeDescriptor};
pub use store::{Document, Documents, SaveResult, Store};
