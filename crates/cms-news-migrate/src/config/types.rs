//! Configuration type definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::category::DataCategory;
use crate::profile::SourceProfile;

/// Page size used when neither the category nor the configuration sets one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Legacy installation (MySQL).
    pub source: SourceConfig,

    /// Where the import bundle is written.
    pub destination: DestinationConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Legacy database configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "mysql" for now).
    #[serde(default = "default_mysql")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Legacy product the database belongs to (default: fireball1).
    #[serde(default)]
    pub profile: SourceProfile,

    /// Table prefix of the legacy installation, e.g. `cms1_`.
    /// Defaults to the profile's prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_prefix: Option<String>,

    /// Installation directory of the legacy product, used to locate
    /// attachment files. May be empty.
    #[serde(default)]
    pub file_system_path: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("profile", &self.profile)
            .field("table_prefix", &self.table_prefix)
            .field("file_system_path", &self.file_system_path)
            .finish()
    }
}

/// Import bundle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Directory the bundle files are appended to.
    pub output_dir: PathBuf,

    /// Locale codes known to the destination. Translations in other locales
    /// are dropped. Empty accepts every locale.
    #[serde(default)]
    pub locales: Vec<String>,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Categories to migrate (wire names or aliases). Defaults to everything
    /// the profile supports.
    #[serde(default = "default_select")]
    pub select: Vec<DataCategory>,

    /// Default rows per page for categories without an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,

    /// Per-category page size overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub page_sizes: BTreeMap<DataCategory, usize>,

    /// ID registry file (default: `<output_dir>/id-registry.json`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            select: default_select(),
            page_size: None,
            page_sizes: BTreeMap::new(),
            registry_file: None,
        }
    }
}

impl Config {
    /// Rows per page for a category.
    ///
    /// Configured per-category overrides win, then the product's built-in
    /// limit, then `migration.page_size`.
    pub fn page_size(&self, category: DataCategory) -> usize {
        self.migration
            .page_sizes
            .get(&category)
            .copied()
            .or_else(|| self.source.profile.page_size(category))
            .or(self.migration.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Path of the persisted ID registry.
    pub fn registry_path(&self) -> PathBuf {
        self.migration
            .registry_file
            .clone()
            .unwrap_or_else(|| self.destination.output_dir.join("id-registry.json"))
    }
}

impl SourceConfig {
    /// Effective table prefix.
    pub fn table_prefix(&self) -> &str {
        self.table_prefix
            .as_deref()
            .unwrap_or_else(|| self.profile.default_prefix())
    }

    /// Installation number encoded in the table prefix.
    pub fn installation_number(&self) -> u32 {
        self.profile.installation_number(self.table_prefix())
    }
}

fn default_mysql() -> String {
    "mysql".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_select() -> Vec<DataCategory> {
    DataCategory::ALL.to_vec()
}
