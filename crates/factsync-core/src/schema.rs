//! Column descriptors and the declared-type families used for comparison

use serde::{Deserialize, Serialize};

/// Declared type family of a source column
///
/// Only the distinctions that matter for typed equality are kept.
/// Everything the comparison does not special-case lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredType {
    /// Boolean type
    Boolean,

    /// Integer and numeric types (any precision)
    Numeric,

    /// Character/text types
    Text,

    /// Dates, timestamps, JSON, arrays and anything else
    Other,
}

impl DeclaredType {
    /// Map an `information_schema.columns.data_type` value to its family
    ///
    /// # Supported Types
    ///
    /// - **Boolean**: `boolean`, `bool`
    /// - **Numeric**: `smallint`, `integer`, `bigint`, `numeric(p,s)`, `decimal`,
    ///   `real`, `double precision` and their internal aliases
    /// - **Text**: `character varying`, `varchar`, `character`, `char`, `text`,
    ///   `citext`, `name`
    pub fn from_data_type(data_type: &str) -> Self {
        let base_type = data_type
            .split('(')
            .next()
            .unwrap_or(data_type)
            .trim()
            .to_lowercase();

        match base_type.as_str() {
            "boolean" | "bool" => Self::Boolean,

            "smallint" | "int2" | "integer" | "int" | "int4" | "bigint" | "int8" => Self::Numeric,
            "numeric" | "decimal" => Self::Numeric,
            "real" | "float4" | "double precision" | "float8" | "float" => Self::Numeric,

            "character varying" | "varchar" | "character" | "char" | "bpchar" => Self::Text,
            "text" | "citext" | "name" => Self::Text,

            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Numeric => write!(f, "NUMERIC"),
            Self::Text => write!(f, "TEXT"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// A column of a staging table, as reported by the warehouse
///
/// Re-fetched on every run; schemas are allowed to change between runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,

    /// Type family used by typed equality
    pub declared_type: DeclaredType,

    /// Warehouse type name (`udt_name`), used to cast text parameters on write
    pub sql_type: String,

    /// 1-based position within the table
    pub ordinal_position: i32,

    /// Whether the column accepts NULL
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// Create a nullable column whose warehouse type is `data_type`
    pub fn new(name: impl Into<String>, data_type: &str, ordinal_position: i32) -> Self {
        Self {
            name: name.into(),
            declared_type: DeclaredType::from_data_type(data_type),
            sql_type: data_type.to_string(),
            ordinal_position,
            nullable: true,
        }
    }

    /// Set nullability
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Override the warehouse type name used for write casts
    pub fn with_sql_type(mut self, sql_type: impl Into<String>) -> Self {
        self.sql_type = sql_type.into();
        self
    }
}

/// Find a column by name
pub fn find_column<'a>(columns: &'a [ColumnDescriptor], name: &str) -> Option<&'a ColumnDescriptor> {
    columns.iter().find(|c| c.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_family() {
        assert_eq!(DeclaredType::from_data_type("boolean"), DeclaredType::Boolean);
        assert_eq!(DeclaredType::from_data_type("bool"), DeclaredType::Boolean);
    }

    #[test]
    fn numeric_family() {
        for ty in ["integer", "bigint", "smallint", "numeric", "numeric(10,2)", "double precision"] {
            assert_eq!(DeclaredType::from_data_type(ty), DeclaredType::Numeric, "{}", ty);
        }
    }

    #[test]
    fn text_and_other_families() {
        assert_eq!(DeclaredType::from_data_type("character varying"), DeclaredType::Text);
        assert_eq!(DeclaredType::from_data_type("TEXT"), DeclaredType::Text);
        assert_eq!(DeclaredType::from_data_type("timestamp without time zone"), DeclaredType::Other);
        assert_eq!(DeclaredType::from_data_type("jsonb"), DeclaredType::Other);
        assert_eq!(DeclaredType::from_data_type("ARRAY"), DeclaredType::Other);
    }

    #[test]
    fn descriptor_builder() {
        let col = ColumnDescriptor::new("is_verified", "boolean", 4)
            .with_nullable(false)
            .with_sql_type("bool");

        assert_eq!(col.declared_type, DeclaredType::Boolean);
        assert_eq!(col.sql_type, "bool");
        assert!(!col.nullable);
        assert_eq!(DeclaredType::Numeric.to_string(), "NUMERIC");
    }
}
