//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }
    if config.source.r#type != "mysql" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'mysql', got '{}'",
            config.source.r#type
        )));
    }
    if let Some(prefix) = &config.source.table_prefix {
        if prefix.is_empty() {
            return Err(MigrateError::Config(
                "source.table_prefix must not be empty when set".into(),
            ));
        }
    }

    // Destination validation
    if config.destination.output_dir.as_os_str().is_empty() {
        return Err(MigrateError::Config(
            "destination.output_dir is required".into(),
        ));
    }

    // Migration config validation - only check if explicitly set
    if config.migration.select.is_empty() {
        return Err(MigrateError::Config(
            "migration.select must name at least one category".into(),
        ));
    }
    if let Some(0) = config.migration.page_size {
        return Err(MigrateError::Config(
            "migration.page_size must be at least 1".into(),
        ));
    }
    if let Some((category, _)) = config.migration.page_sizes.iter().find(|(_, v)| **v == 0) {
        return Err(MigrateError::Config(format!(
            "migration.page_sizes.{} must be at least 1",
            category.alias()
        )));
    }

    Ok(())
}
