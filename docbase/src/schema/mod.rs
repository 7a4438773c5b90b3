pub mod resolver;
pub mod types;

pub use resolver::{resolve, sanitize_table_name};
pub use types::{
    ColumnSpec, DocumentSchema, ScalarType, SqlAffinity, TypeDescriptor, ID_COLUMN, JSON_COLUMN,
};
