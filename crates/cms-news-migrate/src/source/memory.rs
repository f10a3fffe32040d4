//! In-memory legacy source.
//!
//! Serves rows in insertion order, which callers keep in primary-key order.
//! Used by tests and for rehearsing a migration against fixture data.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use super::{check_package, language_item_value, LegacyRow, LocalizedText, SourceReader};
use crate::category::DataCategory;
use crate::error::{MigrateError, Result};
use crate::export::acl::merge_acl_grants;
use crate::profile::SourceProfile;

/// Legacy installation held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    profile: SourceProfile,
    package_version: Option<String>,
    tables: BTreeMap<DataCategory, Vec<LegacyRow>>,
    acl_groups: Vec<LegacyRow>,
    acl_users: Vec<LegacyRow>,
    language_items: BTreeMap<String, Vec<LegacyRow>>,
    tags: BTreeMap<i64, Vec<String>>,
    assignments: BTreeMap<i64, Vec<i64>>,
    missing: BTreeSet<DataCategory>,
}

impl MemorySource {
    /// Empty installation of the given product with a matching package
    /// version registered.
    pub fn new(profile: SourceProfile) -> Self {
        let package_version = match profile {
            SourceProfile::Fireball1 => Some("1.3.0".to_string()),
            SourceProfile::Fireball2Article => Some("2.0.0".to_string()),
            SourceProfile::Cnews1x => None,
        };
        Self {
            profile,
            package_version,
            ..Self::default()
        }
    }

    /// Override the registered package version (`None` = not installed).
    pub fn with_package_version(mut self, version: Option<&str>) -> Self {
        self.package_version = version.map(str::to_string);
        self
    }

    /// Append rows to a category table.
    pub fn with_rows(mut self, category: DataCategory, rows: Vec<LegacyRow>) -> Self {
        self.tables.entry(category).or_default().extend(rows);
        self
    }

    /// Group ACL grant (`optionID`, `optionName`, `objectID`, `optionValue`, `groupID`).
    pub fn with_group_grant(mut self, row: LegacyRow) -> Self {
        self.acl_groups.push(row);
        self
    }

    /// User ACL grant (`optionID`, `optionName`, `objectID`, `optionValue`, `userID`).
    pub fn with_user_grant(mut self, row: LegacyRow) -> Self {
        self.acl_users.push(row);
        self
    }

    /// Language item value for one locale.
    pub fn with_language_item(mut self, item: &str, locale: &str, value: &str) -> Self {
        self.language_items.entry(item.to_string()).or_default().push(
            LegacyRow::new()
                .with("languageCode", locale)
                .with("languageItemValue", value)
                .with("languageCustomItemValue", "")
                .with("languageUseCustomValue", 0),
        );
        self
    }

    /// Language item with a custom override for one locale.
    pub fn with_custom_language_item(
        mut self,
        item: &str,
        locale: &str,
        value: &str,
        custom: &str,
    ) -> Self {
        self.language_items.entry(item.to_string()).or_default().push(
            LegacyRow::new()
                .with("languageCode", locale)
                .with("languageItemValue", value)
                .with("languageCustomItemValue", custom)
                .with("languageUseCustomValue", 1),
        );
        self
    }

    pub fn with_tags(mut self, entry_id: i64, tags: &[&str]) -> Self {
        self.tags
            .entry(entry_id)
            .or_default()
            .extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn with_assignment(mut self, entry_id: i64, category_id: i64) -> Self {
        self.assignments.entry(entry_id).or_default().push(category_id);
        self
    }

    /// Simulate a category whose backing table does not exist.
    pub fn without_table(mut self, category: DataCategory) -> Self {
        self.missing.insert(category);
        self
    }

    fn rows(&self, category: DataCategory) -> Result<Vec<LegacyRow>> {
        if self.missing.contains(&category) {
            return Err(MigrateError::Source(format!(
                "table for {} doesn't exist",
                category
            )));
        }
        Ok(match category {
            DataCategory::NewsCategoryAcl => merge_acl_grants(&self.acl_groups, &self.acl_users),
            other => self.tables.get(&other).cloned().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn validate_source_schema(&self) -> Result<()> {
        match self.profile {
            SourceProfile::Cnews1x => {
                if self.missing.contains(&DataCategory::NewsEntry) {
                    return Err(MigrateError::Validation(format!(
                        "Cannot find {} installation",
                        self.profile.product_name()
                    )));
                }
                Ok(())
            }
            profile => check_package(profile, self.package_version.as_deref()),
        }
    }

    async fn count(&self, category: DataCategory) -> Result<u64> {
        Ok(self.rows(category)?.len() as u64)
    }

    async fn read_page(
        &self,
        category: DataCategory,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<LegacyRow>> {
        Ok(self
            .rows(category)?
            .into_iter()
            .skip(offset as usize)
            .take(limit)
            .collect())
    }

    async fn language_item_values(&self, item: &str) -> Result<LocalizedText> {
        Ok(self
            .language_items
            .get(item)
            .map(|rows| rows.iter().filter_map(language_item_value).collect())
            .unwrap_or_default())
    }

    async fn tags_for(&self, entry_ids: &[i64]) -> Result<BTreeMap<i64, Vec<String>>> {
        if self.profile == SourceProfile::Cnews1x {
            return Ok(BTreeMap::new());
        }
        Ok(entry_ids
            .iter()
            .filter_map(|id| self.tags.get(id).map(|t| (*id, t.clone())))
            .collect())
    }

    async fn categories_for(&self, entry_ids: &[i64]) -> Result<BTreeMap<i64, Vec<i64>>> {
        if self.profile == SourceProfile::Fireball2Article {
            return Ok(BTreeMap::new());
        }
        Ok(entry_ids
            .iter()
            .filter_map(|id| self.assignments.get(id).map(|c| (*id, c.clone())))
            .collect())
    }

    fn profile(&self) -> SourceProfile {
        self.profile
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}
