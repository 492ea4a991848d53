//! Process configuration for mysql-es-sync
//!
//! The configuration is parsed once at startup from a JSON file and passed
//! to each component as part of the sync context; no component re-reads it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Primary-key kinds supported by the scanner.
///
/// Only integer keys support resumable checkpointing; string-keyed tables
/// are re-scanned from the beginning each run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PkType {
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "string")]
    Str,
}

/// MySQL connection parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// Elasticsearch cluster endpoints and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct EsConfig {
    /// One or more cluster endpoints, tried in order
    pub urls: Vec<String>,
    /// Basic-auth username (optional)
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password (optional)
    #[serde(default)]
    pub password: Option<String>,
    /// Prefix prepended to every index name
    #[serde(default)]
    pub index_prefix: String,
}

/// Per-table overrides for primary key, ignored columns, and
/// date-time-encoded columns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableOverride {
    #[serde(default)]
    pub pk: Option<String>,
    #[serde(default)]
    pub pk_type: Option<PkType>,
    #[serde(default)]
    pub ignore_fields: Vec<String>,
    #[serde(default)]
    pub datetime_format_fields: Vec<String>,
}

/// Table selection and per-table sync options.
#[derive(Debug, Clone, Deserialize)]
pub struct DbOptions {
    /// Default primary-key column name
    #[serde(default = "default_pk")]
    pub default_pk: String,
    /// Default primary-key kind
    #[serde(default = "default_pk_type")]
    pub default_pk_type: PkType,
    /// Tables to synchronize; a single "*" entry selects every table not
    /// listed in `ignore_tables`
    #[serde(default = "default_sync_tables")]
    pub sync_tables: Vec<String>,
    #[serde(default)]
    pub ignore_tables: Vec<String>,
    /// Index name -> source tables merged into that one index
    #[serde(default)]
    pub merge_tables: HashMap<String, Vec<String>>,
    /// Columns holding integer epoch timestamps, across all tables
    #[serde(default)]
    pub datetime_format_fields: Vec<String>,
    #[serde(default)]
    pub tables: HashMap<String, TableOverride>,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            default_pk: default_pk(),
            default_pk_type: default_pk_type(),
            sync_tables: default_sync_tables(),
            ignore_tables: Vec::new(),
            merge_tables: HashMap::new(),
            datetime_format_fields: Vec::new(),
            tables: HashMap::new(),
        }
    }
}

/// Parsed process configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db: DbConfig,
    pub es: EsConfig,
    #[serde(default)]
    pub db_options: DbOptions,
    /// Rows fetched per page query
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Cap on rows processed per table per run, to bound a run's duration
    #[serde(default = "default_max_records")]
    pub max_records_per_table: u64,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// MySQL connection options for the configured source database.
    pub fn mysql_opts(&self) -> mysql_async::Opts {
        mysql_async::OptsBuilder::default()
            .ip_or_hostname(self.db.host.clone())
            .tcp_port(self.db.port)
            .user(Some(self.db.username.clone()))
            .pass(Some(self.db.password.clone()))
            .db_name(Some(self.db.database.clone()))
            .into()
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_pk() -> String {
    "id".to_string()
}

fn default_pk_type() -> PkType {
    PkType::Int
}

fn default_sync_tables() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_page_size() -> u64 {
    1000
}

fn default_max_records() -> u64 {
    100_000
}
