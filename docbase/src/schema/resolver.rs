use crate::error::{DocbaseError, Result};
use crate::schema::types::{DocumentSchema, TypeDescriptor, ID_COLUMN, JSON_COLUMN};

/// Resolve a declarative type descriptor into the physical table layout.
///
/// Resolution is a pure function: the same descriptor always yields
/// identical output, independent of call order or how many times it runs.
/// Configuration errors (illegal property names, duplicate or reserved
/// columns) are reported here, not at first use.
pub fn resolve(descriptor: &TypeDescriptor) -> Result<DocumentSchema> {
    let table_name = sanitize_table_name(&descriptor.type_name)?;

    validate_property(&descriptor.id.property)?;

    for (i, column) in descriptor.indexes.iter().enumerate() {
        validate_property(&column.property)?;

        if column.property == descriptor.id.property {
            return Err(DocbaseError::Schema(format!(
                "index property '{}' duplicates the id property",
                column.property
            )));
        }
        if column.property == ID_COLUMN {
            return Err(DocbaseError::Schema(format!(
                "index property '{ID_COLUMN}' collides with the identifier column"
            )));
        }
        if descriptor.indexes[..i]
            .iter()
            .any(|other| other.property == column.property)
        {
            return Err(DocbaseError::Schema(format!(
                "index property '{}' is declared twice",
                column.property
            )));
        }
    }

    Ok(DocumentSchema {
        table_name,
        id: descriptor.id.clone(),
        indexes: descriptor.indexes.clone(),
    })
}

/// Derive a table name from a qualified type name by replacing every
/// character illegal in a SQL identifier with `_`: namespace separators
/// (`.`, `:`), generic-argument decoration (`<`, `>`), backtick and
/// nested-type markers (`+`). Anything else outside `[A-Za-z0-9_]` is a
/// configuration error.
pub fn sanitize_table_name(type_name: &str) -> Result<String> {
    if type_name.is_empty() {
        return Err(DocbaseError::Schema("type name is empty".into()));
    }

    let sanitized: String = type_name
        .chars()
        .map(|c| match c {
            '.' | '`' | '<' | '>' | '+' | ':' => Ok('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => Ok(c),
            c => Err(DocbaseError::Schema(format!(
                "type name '{type_name}' contains '{c}', which cannot appear in a table name"
            ))),
        })
        .collect::<Result<_>>()?;

    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(DocbaseError::Schema(format!(
            "type name '{type_name}' would produce a table name starting with a digit"
        )));
    }

    Ok(sanitized)
}

/// Property names become bare SQL identifiers (column names and
/// json_extract paths), so they are held to identifier rules.
fn validate_property(property: &str) -> Result<()> {
    let mut chars = property.chars();
    let legal = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };

    if !legal {
        return Err(DocbaseError::Schema(format!(
            "'{property}' is not a legal property name"
        )));
    }
    if property == JSON_COLUMN {
        return Err(DocbaseError::Schema(format!(
            "property name '{JSON_COLUMN}' is reserved for the document column"
        )));
    }
    Ok(())
}
