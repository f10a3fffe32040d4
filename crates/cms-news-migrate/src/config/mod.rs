//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash identifying the source and destination pair.
    ///
    /// The migration section is left out so a resumed run may select
    /// additional categories or change page sizes.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(&(&self.source, &self.destination)).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::DataCategory;
    use crate::profile::SourceProfile;

    const YAML: &str = r#"
source:
  host: legacy.example.org
  database: forum
  user: export
  password: hunter2
  profile: fireball2-article
  table_prefix: cms3_
destination:
  output_dir: /tmp/bundle
  locales: [de, en]
migration:
  select: [categories, entries, comments]
  page_size: 50
  page_sizes:
    comments: 25
"#;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.source.port, 3306);
        assert_eq!(config.source.r#type, "mysql");
        assert_eq!(config.source.profile, SourceProfile::Fireball2Article);
        assert_eq!(config.source.installation_number(), 3);
        assert_eq!(
            config.migration.select,
            vec![
                DataCategory::NewsCategory,
                DataCategory::NewsEntry,
                DataCategory::NewsComment
            ]
        );
    }

    #[test]
    fn test_page_size_precedence() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.page_size(DataCategory::NewsComment), 25);
        assert_eq!(config.page_size(DataCategory::NewsEntry), 300);
        assert_eq!(config.page_size(DataCategory::NewsCategory), 50);
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
source:
  host: localhost
  database: wcf
  user: root
destination:
  output_dir: out
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.source.profile, SourceProfile::Fireball1);
        assert_eq!(config.source.table_prefix(), "cms1_");
        assert_eq!(config.migration.select.len(), DataCategory::ALL.len());
        assert_eq!(config.page_size(DataCategory::NewsLike), 100);
        assert_eq!(
            config.registry_path(),
            std::path::PathBuf::from("out/id-registry.json")
        );
    }

    #[test]
    fn test_hash_ignores_migration_section() {
        let a = Config::from_yaml(YAML).unwrap();
        let mut b = a.clone();
        b.migration.select = vec![DataCategory::NewsLike];
        b.migration.page_size = Some(7);
        assert_eq!(a.hash(), b.hash());

        b.source.database = "other".into();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_unknown_category_is_config_error() {
        let yaml = YAML.replace("[categories, entries, comments]", "[blogs]");
        let err = Config::from_yaml(&yaml).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }
}
