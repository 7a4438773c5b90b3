//! SQL text for the fixed set of document operations.
//!
//! Stateless renderers: each call produces the full statement text for one
//! operation shape, parameterized only on the `@json` blob and, where a
//! filter applies, one scalar `@value`. Identifier safety is the schema
//! resolver's job — table and column names arrive here already validated,
//! so they are rendered bare.

use crate::schema::{DocumentSchema, ID_COLUMN};

/// `INSERT` that fails on an existing `Id` (uniqueness surfaces unmodified).
pub fn insert(table: &str) -> String {
    format!("INSERT INTO {table} (json) VALUES (@json)")
}

/// Same, returning the row as stored.
pub fn insert_returning(table: &str) -> String {
    format!("{} RETURNING json", insert(table))
}

/// Insert-or-replace keyed by `Id`.
pub fn save(table: &str) -> String {
    format!(
        "INSERT INTO {table} (json) VALUES (@json) \
         ON CONFLICT({ID_COLUMN}) DO UPDATE SET json = @json"
    )
}

/// Same, returning the row as stored.
pub fn save_returning(table: &str) -> String {
    format!("{} RETURNING json", save(table))
}

/// Equality filter on one declared column (`Id` included).
pub fn select_by(table: &str, column: &str) -> String {
    format!("SELECT json FROM {table} WHERE {column} = @value")
}

/// Full scan; order unspecified.
pub fn select_all(table: &str) -> String {
    format!("SELECT json FROM {table}")
}

/// Bulk delete by equality on one declared column.
pub fn delete_by(table: &str, column: &str) -> String {
    format!("DELETE FROM {table} WHERE {column} = @value")
}

/// Same, returning the deleted rows.
pub fn delete_by_returning(table: &str, column: &str) -> String {
    format!("{} RETURNING json", delete_by(table, column))
}

pub fn count(table: &str) -> String {
    format!("SELECT count(1) FROM {table}")
}

/// Convenience for the facade: the `Id` equality select for a schema.
pub fn select_by_id(schema: &DocumentSchema) -> String {
    select_by(&schema.table_name, ID_COLUMN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_shapes() {
        assert_eq!(insert("T"), "INSERT INTO T (json) VALUES (@json)");
        assert_eq!(
            insert_returning("T"),
            "INSERT INTO T (json) VALUES (@json) RETURNING json"
        );
    }

    #[test]
    fn test_save_shapes() {
        assert_eq!(
            save("T"),
            "INSERT INTO T (json) VALUES (@json) ON CONFLICT(Id) DO UPDATE SET json = @json"
        );
        assert_eq!(
            save_returning("T"),
            "INSERT INTO T (json) VALUES (@json) ON CONFLICT(Id) DO UPDATE SET json = @json RETURNING json"
        );
    }

    #[test]
    fn test_select_shapes() {
        assert_eq!(select_by("T", "Id"), "SELECT json FROM T WHERE Id = @value");
        assert_eq!(
            select_by("T", "enabled"),
            "SELECT json FROM T WHERE enabled = @value"
        );
        assert_eq!(select_all("T"), "SELECT json FROM T");
    }

    #[test]
    fn test_delete_shapes() {
        assert_eq!(delete_by("T", "Id"), "DELETE FROM T WHERE Id = @value");
        assert_eq!(
            delete_by_returning("T", "enabled"),
            "DELETE FROM T WHERE enabled = @value RETURNING json"
        );
    }

    #[test]
    fn test_count_shape() {
        assert_eq!(count("T"), "SELECT count(1) FROM T");
    }
}
