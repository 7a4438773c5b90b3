use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocbaseError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Duplicate Id in {table}: {count} rows share one Id value")]
    DuplicateId { table: String, count: usize },

    #[error("Property '{property}' is not an indexed column of {table}")]
    NotIndexed { table: String, property: String },

    #[error("Operation queue is closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DocbaseError>;
