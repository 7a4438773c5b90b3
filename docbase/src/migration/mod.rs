//! Brings the physical table in line with a resolved schema before any
//! document operation runs for the type.
//!
//! Migrations are strictly additive: tables are created if missing, absent
//! columns are appended, indexes are ensured with create-if-not-exists
//! semantics. Existing columns and rows are never dropped or rewritten.
//! Any DDL failure is fatal for the registration and propagates.

use crate::error::{DocbaseError, Result};
use crate::schema::{ColumnSpec, DocumentSchema, ID_COLUMN, JSON_COLUMN};
use rusqlite::Connection;
use std::collections::HashSet;

/// Create or evolve the table backing `schema`. Safe to call repeatedly.
pub fn migrate(conn: &Connection, schema: &DocumentSchema) -> Result<()> {
    execute_ddl(conn, &create_table_sql(schema))?;

    // Tables created under an older, narrower schema grow here.
    let existing = table_columns(conn, &schema.table_name)?;
    if !existing.contains(ID_COLUMN) {
        log::debug!("{}: adding {} column", schema.table_name, ID_COLUMN);
        execute_ddl(conn, &add_column_sql(&schema.table_name, ID_COLUMN, &schema.id))?;
    }
    for column in &schema.indexes {
        if !existing.contains(&column.property) {
            log::debug!("{}: adding {} column", schema.table_name, column.property);
            execute_ddl(
                conn,
                &add_column_sql(&schema.table_name, &column.property, column),
            )?;
        }
    }

    execute_ddl(conn, &unique_id_index_sql(&schema.table_name))?;
    for column in &schema.indexes {
        execute_ddl(conn, &index_sql(&schema.table_name, &column.property))?;
    }

    Ok(())
}

fn execute_ddl(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute(sql, []).map_err(|e| {
        DocbaseError::Migration(format!("failed to apply `{sql}`: {e}"))
    })?;
    Ok(())
}

/// A column computed from the document text. Never written directly.
fn generated_column(name: &str, source: &ColumnSpec, constraints: &str) -> String {
    format!(
        "{name} {affinity}{constraints} GENERATED ALWAYS AS (json_extract({JSON_COLUMN}, '$.{property}')) VIRTUAL",
        affinity = source.scalar.affinity().as_str(),
        property = source.property,
    )
}

fn create_table_sql(schema: &DocumentSchema) -> String {
    let mut columns = Vec::with_capacity(schema.indexes.len() + 2);
    columns.push(generated_column(ID_COLUMN, &schema.id, " NOT NULL UNIQUE"));
    for column in &schema.indexes {
        columns.push(generated_column(&column.property, column, " NOT NULL"));
    }
    columns.push(format!("{JSON_COLUMN} TEXT"));

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        schema.table_name,
        columns.join(", ")
    )
}

/// ALTER TABLE cannot add UNIQUE or NOT NULL columns; for grown tables the
/// unique index on `Id` carries the integrity guarantee instead.
fn add_column_sql(table: &str, name: &str, source: &ColumnSpec) -> String {
    format!(
        "ALTER TABLE {table} ADD COLUMN {}",
        generated_column(name, source, "")
    )
}

fn unique_id_index_sql(table: &str) -> String {
    format!("CREATE UNIQUE INDEX IF NOT EXISTS {table}_{ID_COLUMN} ON {table}({ID_COLUMN})")
}

fn index_sql(table: &str, column: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS {table}_{column} ON {table}({column})")
}

/// Enumerate the table's actual columns. `table_xinfo` lists generated
/// columns, which `table_info` omits.
fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_xinfo(?1)")?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(names)
}
