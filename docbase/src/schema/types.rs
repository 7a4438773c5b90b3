use crate::error::{DocbaseError, Result};
use serde::{Deserialize, Serialize};

/// Name of the generated identifier column, shared by every document table.
pub const ID_COLUMN: &str = "Id";

/// Name of the column holding the document text, the sole ground truth.
pub const JSON_COLUMN: &str = "json";

/// Scalar types usable as the identifier property or as an indexed property.
/// The set is closed: a property of any other shape cannot be promoted to a
/// SQL column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    Text,
    Integer,
    Boolean,
    Real,
    Guid,
}

impl ScalarType {
    /// SQLite column affinity for this scalar. Pure and total.
    pub fn affinity(self) -> SqlAffinity {
        match self {
            ScalarType::Text => SqlAffinity::Text,
            ScalarType::Integer => SqlAffinity::Integer,
            // json_extract yields 0/1 for JSON booleans
            ScalarType::Boolean => SqlAffinity::Integer,
            ScalarType::Real => SqlAffinity::Real,
            // canonical hyphenated string form
            ScalarType::Guid => SqlAffinity::Text,
        }
    }

    /// Convert a document property value into the SQL value that the
    /// corresponding generated column yields, so equality filters line up.
    pub fn sql_value(self, value: &serde_json::Value) -> Result<rusqlite::types::Value> {
        use rusqlite::types::Value as Sql;

        match self {
            ScalarType::Text => value
                .as_str()
                .map(|s| Sql::Text(s.to_string()))
                .ok_or_else(|| type_mismatch(self, value)),
            ScalarType::Integer => value
                .as_i64()
                .map(Sql::Integer)
                .ok_or_else(|| type_mismatch(self, value)),
            ScalarType::Boolean => value
                .as_bool()
                .map(|b| Sql::Integer(b as i64))
                .ok_or_else(|| type_mismatch(self, value)),
            ScalarType::Real => value
                .as_f64()
                .map(Sql::Real)
                .ok_or_else(|| type_mismatch(self, value)),
            ScalarType::Guid => {
                let s = value.as_str().ok_or_else(|| type_mismatch(self, value))?;
                uuid::Uuid::parse_str(s).map_err(|e| {
                    DocbaseError::Schema(format!("'{s}' is not a valid guid: {e}"))
                })?;
                Ok(Sql::Text(s.to_string()))
            }
        }
    }
}

fn type_mismatch(scalar: ScalarType, value: &serde_json::Value) -> DocbaseError {
    DocbaseError::Schema(format!(
        "expected a {scalar:?} value, got {value}"
    ))
}

/// SQLite column affinity. Only the affinities the scalar set maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlAffinity {
    Text,
    Integer,
    Real,
}

impl SqlAffinity {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlAffinity::Text => "TEXT",
            SqlAffinity::Integer => "INTEGER",
            SqlAffinity::Real => "REAL",
        }
    }
}

/// A document property promoted to a SQL column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub property: String,
    pub scalar: ScalarType,
}

impl ColumnSpec {
    pub fn new(property: impl Into<String>, scalar: ScalarType) -> Self {
        ColumnSpec {
            property: property.into(),
            scalar,
        }
    }
}

/// Declarative registration input for a document type: the qualified type
/// name, the identifier property, and the ordered list of indexed properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub type_name: String,
    pub id: ColumnSpec,
    pub indexes: Vec<ColumnSpec>,
}

impl TypeDescriptor {
    pub fn new(
        type_name: impl Into<String>,
        id_property: impl Into<String>,
        id_type: ScalarType,
    ) -> Self {
        TypeDescriptor {
            type_name: type_name.into(),
            id: ColumnSpec::new(id_property, id_type),
            indexes: Vec::new(),
        }
    }

    /// Descriptor named after the Rust type itself.
    pub fn of<T>(id_property: impl Into<String>, id_type: ScalarType) -> Self {
        TypeDescriptor::new(std::any::type_name::<T>(), id_property, id_type)
    }

    /// Declare an additional indexed property. Order is preserved.
    pub fn with_index(mut self, property: impl Into<String>, scalar: ScalarType) -> Self {
        self.indexes.push(ColumnSpec::new(property, scalar));
        self
    }
}

/// Resolved physical layout of a document table: the sanitized table name,
/// the identifier column, and the index columns. Deterministic per
/// descriptor; the same descriptor always resolves to identical output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub table_name: String,
    pub id: ColumnSpec,
    pub indexes: Vec<ColumnSpec>,
}

impl DocumentSchema {
    /// Map a property name to its queryable column, if it is declared.
    /// The identifier property (or `Id` itself) maps to the `Id` column;
    /// index properties map to the column carrying their name.
    pub fn column_for(&self, property: &str) -> Option<(&str, ScalarType)> {
        if property == ID_COLUMN || property == self.id.property {
            return Some((ID_COLUMN, self.id.scalar));
        }
        self.indexes
            .iter()
            .find(|c| c.property == property)
            .map(|c| (c.property.as_str(), c.scalar))
    }

    /// Extract the identifier value from a serialized document as the SQL
    /// value the `Id` column yields for that row.
    pub fn id_value(&self, document: &serde_json::Value) -> Result<rusqlite::types::Value> {
        let value = document.get(&self.id.property).ok_or_else(|| {
            DocbaseError::Schema(format!(
                "document is missing the id property '{}'",
                self.id.property
            ))
        })?;
        self.id.scalar.sql_value(value)
    }
}
