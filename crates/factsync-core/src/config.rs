//! Configuration schema (factsync.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dictionary::{DictionaryError, ImpactDictionary};

/// Default file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "factsync.toml";

/// How changed columns are determined for existing records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMode {
    /// Compare every column against the baseline with typed equality
    PreciseColumnDiff,

    /// Assume every dictionary-mapped column changed; inserts force full rebuilds
    DictionaryAssumedColumns,
}

impl Default for DetectionMode {
    fn default() -> Self {
        Self::PreciseColumnDiff
    }
}

impl std::fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreciseColumnDiff => write!(f, "precise-column-diff"),
            Self::DictionaryAssumedColumns => write!(f, "dictionary-assumed-columns"),
        }
    }
}

/// Warehouse connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// libpq key/value connection string; takes precedence over the fields above
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// Connect over TLS (requires the `tls` feature)
    pub tls: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    /// Schema holding recently changed rows
    pub staging_schema: String,

    /// Schema holding the last synchronized snapshot
    pub baseline_schema: String,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: None,
            connection_string: None,
            tls: false,
            connect_timeout_secs: None,
            staging_schema: "staging".to_string(),
            baseline_schema: "public".to_string(),
        }
    }
}

impl WarehouseConfig {
    /// Build a libpq key/value connection string
    pub fn to_connection_string(&self) -> String {
        if let Some(conn_str) = &self.connection_string {
            return conn_str.clone();
        }

        let mut parts = vec![
            format!("host={}", quote_conn_value(&self.host)),
            format!("port={}", self.port),
            format!("dbname={}", quote_conn_value(&self.database)),
            format!("user={}", quote_conn_value(&self.user)),
        ];

        if let Some(password) = &self.password {
            parts.push(format!("password={}", quote_conn_value(password)));
        }

        if let Some(timeout) = self.connect_timeout_secs {
            parts.push(format!("connect_timeout={}", timeout));
        }

        parts.join(" ")
    }

    /// Apply `FACTSYNC_DATABASE_URL` and the standard `PG*` variables
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("FACTSYNC_DATABASE_URL") {
            self.connection_string = Some(url);
        }
        if let Some(host) = lookup("PGHOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PGPORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(database) = lookup("PGDATABASE") {
            self.database = database;
        }
        if let Some(user) = lookup("PGUSER") {
            self.user = user;
        }
        if let Some(password) = lookup("PGPASSWORD") {
            self.password = Some(password);
        }
    }
}

/// Quote a libpq connection string value when it needs it
fn quote_conn_value(value: &str) -> String {
    if !value.is_empty() && !value.contains(|c: char| c.is_whitespace() || c == '\'' || c == '\\') {
        return value.to_string();
    }

    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Source tables, processed in this order
    pub tables: Vec<String>,

    /// Detection strategy
    pub detection_mode: DetectionMode,

    /// Columns never compared (timestamps and detection-derived flags)
    pub metadata_columns: Vec<String>,

    /// Row creation timestamp column
    pub created_column: String,

    /// Row update timestamp column (also the scan order)
    pub updated_column: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tables: [
                "companies",
                "buyer_seller_company_mappings",
                "users",
                "teams",
                "team_members",
                "cities",
                "countries",
                "product_categories",
                "user_company_mappings",
                "taggings",
                "tags",
                "preferred_vendor_item_mappings",
            ]
            .iter()
            .map(|t| t.to_string())
            .collect(),
            detection_mode: DetectionMode::default(),
            metadata_columns: ["created_at", "updated_at", "change_type", "is_new_record"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            created_column: "created_at".to_string(),
            updated_column: "updated_at".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Check if a column is excluded from comparison
    pub fn is_metadata_column(&self, column: &str) -> bool {
        self.metadata_columns.iter().any(|c| c == column)
    }
}

/// dbt invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbtConfig {
    /// Executable name or path
    pub executable: String,

    /// `--target` passed to every run
    pub target: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles_dir: Option<PathBuf>,

    /// Upper bound on a single model run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for DbtConfig {
    fn default() -> Self {
        Self {
            executable: "dbt".to_string(),
            target: "dev".to_string(),
            project_dir: None,
            profiles_dir: None,
            timeout_secs: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to an impact dictionary TOML; the built-in one is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<PathBuf>,

    #[serde(default)]
    pub warehouse: WarehouseConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub dbt: DbtConfig,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dictionary: None,
            warehouse: WarehouseConfig::default(),
            pipeline: PipelineConfig::default(),
            dbt: DbtConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        config.validate()?;
        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.project_root = std::env::current_dir().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, else `factsync.toml` if present, else defaults
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.tables.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::InvalidValue("pipeline.tables contains an empty name".to_string()));
        }
        if self.warehouse.staging_schema == self.warehouse.baseline_schema {
            return Err(ConfigError::InvalidValue(format!(
                "staging and baseline schema are both '{}'",
                self.warehouse.staging_schema
            )));
        }
        Ok(())
    }

    /// Load the configured impact dictionary, or the built-in one
    pub fn load_dictionary(&self) -> Result<ImpactDictionary, DictionaryError> {
        match &self.dictionary {
            Some(path) if path.is_relative() => ImpactDictionary::from_file(&self.project_root.join(path)),
            Some(path) => ImpactDictionary::from_file(path),
            None => ImpactDictionary::builtin(),
        }
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
