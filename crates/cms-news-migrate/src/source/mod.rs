//! Legacy source database operations.

mod memory;
mod mysql;
pub mod queries;
mod row;

pub use memory::MemorySource;
pub use mysql::MysqlSource;
pub use row::{LegacyRow, RowValue};

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::category::DataCategory;
use crate::error::{MigrateError, Result};
use crate::profile::SourceProfile;

/// Locale code to text.
pub type LocalizedText = BTreeMap<String, String>;

/// Read access to a legacy installation.
///
/// Pages are ordered by primary key and adjacent `(offset, limit)` ranges
/// partition a category without gaps or duplicates, provided the source is
/// not written to during the run.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Fail fast unless the database holds the expected product/version.
    async fn validate_source_schema(&self) -> Result<()>;

    /// Number of rows in a category.
    async fn count(&self, category: DataCategory) -> Result<u64>;

    /// Read one page of a category.
    async fn read_page(
        &self,
        category: DataCategory,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<LegacyRow>>;

    /// All locale values of a language item, custom overrides applied.
    async fn language_item_values(&self, item: &str) -> Result<LocalizedText>;

    /// Tag names per entry ID.
    async fn tags_for(&self, entry_ids: &[i64]) -> Result<BTreeMap<i64, Vec<String>>>;

    /// Legacy category IDs per entry ID.
    async fn categories_for(&self, entry_ids: &[i64]) -> Result<BTreeMap<i64, Vec<i64>>>;

    /// Product profile this source reads.
    fn profile(&self) -> SourceProfile;

    /// Get the database type.
    fn db_type(&self) -> &str;

    /// Close all connections.
    async fn close(&self);
}

/// Check a package registration against the profile.
pub(crate) fn check_package(profile: SourceProfile, version: Option<&str>) -> Result<()> {
    match version {
        Some(v) if profile.accepts_version(v) => Ok(()),
        Some(v) => Err(MigrateError::Validation(format!(
            "Cannot find {} installation (found package version {})",
            profile.product_name(),
            v
        ))),
        None => Err(MigrateError::Validation(format!(
            "Cannot find {} installation (package {} not registered)",
            profile.product_name(),
            profile.package_name().unwrap_or("-")
        ))),
    }
}

/// Locale and effective value of one language item row.
///
/// The custom value wins when `languageUseCustomValue` is set. Rows without
/// a language code are dropped.
pub(crate) fn language_item_value(row: &LegacyRow) -> Option<(String, String)> {
    let locale = row.text("languageCode");
    if locale.is_empty() {
        return None;
    }
    let value = if row.flag("languageUseCustomValue") {
        row.text("languageCustomItemValue")
    } else {
        row.text("languageItemValue")
    };
    Some((locale, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_value_wins_when_flagged() {
        let row = LegacyRow::new()
            .with("languageCode", "de")
            .with("languageItemValue", "Nachrichten")
            .with("languageCustomItemValue", "Neuigkeiten")
            .with("languageUseCustomValue", 1);
        assert_eq!(
            language_item_value(&row),
            Some(("de".into(), "Neuigkeiten".into()))
        );

        let row = row.with("languageUseCustomValue", 0);
        assert_eq!(
            language_item_value(&row),
            Some(("de".into(), "Nachrichten".into()))
        );
    }

    #[test]
    fn test_item_without_language_is_dropped() {
        let row = LegacyRow::new().with("languageItemValue", "x");
        assert_eq!(language_item_value(&row), None);
    }

    #[test]
    fn test_check_package() {
        assert!(check_package(SourceProfile::Fireball1, Some("1.3.0")).is_ok());
        let err = check_package(SourceProfile::Fireball1, Some("2.0.0")).unwrap_err();
        assert!(matches!(err, MigrateError::Validation(_)));
        assert!(err.to_string().contains("Fireball CMS 1.x"));
        assert!(check_package(SourceProfile::Fireball2Article, None).is_err());
    }
}
