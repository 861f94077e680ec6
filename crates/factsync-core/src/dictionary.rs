//! Impact dictionary: which artifact columns each source column feeds
//!
//! The dictionary is static configuration. It is loaded once at startup and
//! handed by reference to whatever needs it; there is no API to mutate it.
//!
//! ## Format
//!
//! ```toml
//! [companies.email]
//! fact_vendor = "vendor_email"
//! fact_company_profile = "contact_email"
//!
//! [companies.misc]
//! fact_vendor = "misc,score_value"   # fan-out to two target columns
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Built-in dictionary, embedded at compile time
const BUILTIN_DICTIONARY: &str = include_str!("dictionary.toml");

/// Target column specification: one column name or a comma-joined list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSpec(String);

impl ColumnSpec {
    /// Create a column spec
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    /// Raw spec as written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Target column names, split on commas and trimmed
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.0.split(',').map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Artifact name → column spec for one source column
pub type ArtifactMapping = BTreeMap<String, ColumnSpec>;

/// (source table, source column) → artifact mappings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImpactDictionary {
    tables: BTreeMap<String, BTreeMap<String, ArtifactMapping>>,
}

impl ImpactDictionary {
    /// Load the dictionary shipped with the binary
    pub fn builtin() -> Result<Self, DictionaryError> {
        Self::from_toml(BUILTIN_DICTIONARY)
    }

    /// Load a dictionary from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, DictionaryError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DictionaryError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate a dictionary from a TOML string
    pub fn from_toml(toml: &str) -> Result<Self, DictionaryError> {
        let dictionary: ImpactDictionary = toml::from_str(toml)
            .map_err(|e| DictionaryError::ParseError(e.to_string()))?;

        dictionary.validate()?;
        Ok(dictionary)
    }

    fn validate(&self) -> Result<(), DictionaryError> {
        for (table, columns) in &self.tables {
            for (column, mapping) in columns {
                for (artifact, spec) in mapping {
                    if artifact.trim().is_empty() {
                        return Err(DictionaryError::InvalidEntry {
                            table: table.clone(),
                            column: column.clone(),
                            reason: "empty artifact name".to_string(),
                        });
                    }

                    if spec.targets().next().is_none() {
                        return Err(DictionaryError::InvalidEntry {
                            table: table.clone(),
                            column: column.clone(),
                            reason: format!("no target columns for artifact '{}'", artifact),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// True if the table has at least one mapped column
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Source tables with mappings
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Artifact mappings for a source column
    pub fn mapping(&self, table: &str, column: &str) -> Option<&ArtifactMapping> {
        self.tables.get(table).and_then(|columns| columns.get(column))
    }

    /// Mapped source columns of a table, in sorted order
    pub fn mapped_columns(&self, table: &str) -> Vec<&str> {
        self.tables
            .get(table)
            .map(|columns| columns.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every artifact fed by any column of a table
    pub fn artifacts_for_table(&self, table: &str) -> BTreeSet<&str> {
        self.tables
            .get(table)
            .map(|columns| {
                columns
                    .values()
                    .flat_map(|mapping| mapping.keys().map(String::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Dictionary error types
#[derive(Debug, thiserror::Error)]
pub enum DictionaryError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid mapping {table}.{column}: {reason}")]
    InvalidEntry {
        table: String,
        column: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dictionary_loads() {
        let dictionary = ImpactDictionary::builtin().unwrap();

        assert!(dictionary.has_table("companies"));
        assert!(dictionary.has_table("users_invited_by"));
        assert!(!dictionary.has_table("team_members"));

        let email = dictionary.mapping("companies", "email").unwrap();
        assert_eq!(email["fact_vendor"].as_str(), "vendor_email");
        assert_eq!(email["fact_company_profile"].as_str(), "contact_email");
    }

    #[test]
    fn comma_joined_spec_fans_out() {
        let spec = ColumnSpec::new("invited_by, invited_by_name ,invited_by_email,");
        assert_eq!(
            spec.targets().collect::<Vec<_>>(),
            vec!["invited_by", "invited_by_name", "invited_by_email"]
        );
    }

    #[test]
    fn artifacts_for_table() {
        let dictionary = ImpactDictionary::builtin().unwrap();
        let artifacts = dictionary.artifacts_for_table("companies");

        assert_eq!(
            artifacts.into_iter().collect::<Vec<_>>(),
            vec!["fact_company_profile", "fact_financial", "fact_vendor"]
        );
        assert!(dictionary.artifacts_for_table("unknown").is_empty());
    }

    #[test]
    fn rejects_spec_without_targets() {
        let err = ImpactDictionary::from_toml(
            r#"
            [companies.email]
            fact_vendor = " , "
            "#,
        )
        .unwrap_err();

        assert!(matches!(err, DictionaryError::InvalidEntry { .. }));
        assert!(err.to_string().contains("companies.email"));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = ImpactDictionary::from_toml("[companies").unwrap_err();
        assert!(matches!(err, DictionaryError::ParseError(_)));
    }

    #[test]
    fn quoted_column_names() {
        let dictionary = ImpactDictionary::builtin().unwrap();
        assert!(dictionary
            .mapping("users_invited_by", "first_name + last_name")
            .is_some());
    }
}
