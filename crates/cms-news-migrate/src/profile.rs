//! Legacy product profiles.
//!
//! A profile names the legacy product/version being exported and fixes which
//! categories it supports, how its table prefix encodes the installation
//! number, and which destination object types records are written as.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::category::DataCategory;

/// Legacy product the source database belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceProfile {
    /// Fireball CMS 1.x news.
    #[default]
    Fireball1,

    /// Fireball CMS News 1.2/2.0, imported as articles.
    Fireball2Article,

    /// cNews for WCF 1.1.
    Cnews1x,
}

impl SourceProfile {
    /// Categories this product can export, in declaration order.
    pub fn supported(self) -> &'static [DataCategory] {
        match self {
            SourceProfile::Fireball1 => &DataCategory::ALL,
            SourceProfile::Fireball2Article => &[
                DataCategory::NewsCategory,
                DataCategory::NewsEntry,
                DataCategory::NewsComment,
                DataCategory::NewsCommentResponse,
            ],
            SourceProfile::Cnews1x => &[
                DataCategory::NewsCategory,
                DataCategory::NewsEntry,
                DataCategory::NewsComment,
            ],
        }
    }

    pub fn supports(self, category: DataCategory) -> bool {
        self.supported().contains(&category)
    }

    /// Page size for a category before configuration overrides are applied.
    pub fn page_size(self, category: DataCategory) -> Option<usize> {
        match (self, category) {
            (SourceProfile::Fireball2Article, DataCategory::NewsEntry) => Some(300),
            (SourceProfile::Fireball2Article, _) => None,
            _ => category.page_size_override(),
        }
    }

    /// Destination object type for records of a category.
    pub fn object_type(self, category: DataCategory) -> &'static str {
        match (self, category) {
            (SourceProfile::Fireball2Article, DataCategory::NewsCategory) => {
                "com.woltlab.wcf.article.category"
            }
            (SourceProfile::Fireball2Article, DataCategory::NewsEntry) => "com.woltlab.wcf.article",
            (SourceProfile::Fireball2Article, DataCategory::NewsComment) => {
                "com.woltlab.wcf.article.comment"
            }
            (SourceProfile::Fireball2Article, DataCategory::NewsCommentResponse) => {
                "com.woltlab.wcf.article.comment.response"
            }
            (_, category) => category.name(),
        }
    }

    /// Table prefix used when none is configured.
    pub fn default_prefix(self) -> &'static str {
        match self {
            SourceProfile::Fireball1 | SourceProfile::Fireball2Article => "cms1_",
            SourceProfile::Cnews1x => "wbb1_1_",
        }
    }

    /// Extract the installation number from a table prefix.
    ///
    /// Fireball prefixes look like `cms1_`, cNews installations like `wcf1_`.
    /// Prefixes that do not match fall back to the product default.
    pub fn installation_number(self, prefix: &str) -> u32 {
        let (pattern, fallback) = match self {
            SourceProfile::Fireball1 | SourceProfile::Fireball2Article => (r"^cms(\d+)_$", 0),
            SourceProfile::Cnews1x => (r"^wcf(\d+)_$", 1),
        };

        Regex::new(pattern)
            .ok()
            .and_then(|re| re.captures(prefix))
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(fallback)
    }

    /// Package whose registration identifies the installation, if the
    /// product registers one.
    pub fn package_name(self) -> Option<&'static str> {
        match self {
            SourceProfile::Fireball1 => Some("de.codequake.cms"),
            SourceProfile::Fireball2Article => Some("de.codequake.cms.news"),
            SourceProfile::Cnews1x => None,
        }
    }

    /// Whether a registered package version belongs to this product.
    pub fn accepts_version(self, version: &str) -> bool {
        match self {
            SourceProfile::Fireball1 => version.starts_with('1'),
            SourceProfile::Fireball2Article => {
                version.starts_with("1.2") || version.starts_with("2.0")
            }
            SourceProfile::Cnews1x => true,
        }
    }

    /// Human-readable product name for logs and validation errors.
    pub fn product_name(self) -> &'static str {
        match self {
            SourceProfile::Fireball1 => "Fireball CMS 1.x",
            SourceProfile::Fireball2Article => "Fireball CMS News 1.2/2.0",
            SourceProfile::Cnews1x => "cNews 1.x",
        }
    }
}
