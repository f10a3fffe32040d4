//! Migratable data categories.
//!
//! Every category is a closed enum variant carrying its wire name, declared
//! dependencies, page-size override and identity semantics as data. Behaviour
//! is resolved once when the processing queue is built; nothing downstream
//! dispatches on category name strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// A named unit of migratable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataCategory {
    NewsCategory,
    NewsCategoryAcl,
    NewsEntry,
    NewsComment,
    NewsCommentResponse,
    NewsLike,
    NewsAttachment,
}

impl DataCategory {
    /// All categories in declaration order. Queue tie-breaks follow this order.
    pub const ALL: [DataCategory; 7] = [
        DataCategory::NewsCategory,
        DataCategory::NewsCategoryAcl,
        DataCategory::NewsEntry,
        DataCategory::NewsComment,
        DataCategory::NewsCommentResponse,
        DataCategory::NewsLike,
        DataCategory::NewsAttachment,
    ];

    /// Stable wire name, also used as the ID registry namespace.
    pub fn name(self) -> &'static str {
        match self {
            DataCategory::NewsCategory => "de.codequake.cms.category.news",
            DataCategory::NewsCategoryAcl => "de.codequake.cms.category.news.acl",
            DataCategory::NewsEntry => "de.codequake.cms.news",
            DataCategory::NewsComment => "de.codequake.cms.news.comment",
            DataCategory::NewsCommentResponse => "de.codequake.cms.news.comment.response",
            DataCategory::NewsLike => "de.codequake.cms.news.like",
            DataCategory::NewsAttachment => "de.codequake.cms.news.attachment",
        }
    }

    /// Short operator-facing alias.
    pub fn alias(self) -> &'static str {
        match self {
            DataCategory::NewsCategory => "categories",
            DataCategory::NewsCategoryAcl => "acl",
            DataCategory::NewsEntry => "entries",
            DataCategory::NewsComment => "comments",
            DataCategory::NewsCommentResponse => "comment-responses",
            DataCategory::NewsLike => "likes",
            DataCategory::NewsAttachment => "attachments",
        }
    }

    /// Categories that must be fully imported before this one, when selected.
    pub fn dependencies(self) -> &'static [DataCategory] {
        match self {
            DataCategory::NewsCategory => &[],
            DataCategory::NewsCategoryAcl => &[DataCategory::NewsCategory],
            DataCategory::NewsEntry => &[DataCategory::NewsCategory],
            DataCategory::NewsComment => &[DataCategory::NewsEntry],
            DataCategory::NewsCommentResponse => &[DataCategory::NewsComment],
            DataCategory::NewsLike => &[DataCategory::NewsEntry],
            DataCategory::NewsAttachment => &[DataCategory::NewsEntry],
        }
    }

    /// Categories that are queued automatically whenever this one is selected.
    pub fn implied(self) -> &'static [DataCategory] {
        match self {
            DataCategory::NewsComment => &[DataCategory::NewsCommentResponse],
            _ => &[],
        }
    }

    /// Page-size override, if the category has one.
    pub fn page_size_override(self) -> Option<usize> {
        match self {
            DataCategory::NewsCategory => Some(300),
            DataCategory::NewsCategoryAcl => Some(50),
            DataCategory::NewsEntry => Some(200),
            DataCategory::NewsAttachment => Some(100),
            _ => None,
        }
    }

    /// Whether rows have a natural identity tracked in the ID registry.
    ///
    /// Likes and ACL entries are never referenced by legacy ID downstream, so
    /// they are imported with a zero placeholder and not registered.
    pub fn has_identity(self) -> bool {
        !matches!(
            self,
            DataCategory::NewsLike | DataCategory::NewsCategoryAcl
        )
    }

    /// Primary key column of the legacy rows, if any.
    pub fn primary_key(self) -> Option<&'static str> {
        match self {
            DataCategory::NewsCategory => Some("categoryID"),
            DataCategory::NewsCategoryAcl => None,
            DataCategory::NewsEntry => Some("newsID"),
            DataCategory::NewsComment => Some("commentID"),
            DataCategory::NewsCommentResponse => Some("responseID"),
            DataCategory::NewsLike => Some("likeID"),
            DataCategory::NewsAttachment => Some("attachmentID"),
        }
    }

    /// Whether rows are buffered and imported as a parent/child tree.
    pub fn is_hierarchical(self) -> bool {
        matches!(self, DataCategory::NewsCategory)
    }

    /// Position in [`DataCategory::ALL`].
    pub fn ordinal(self) -> usize {
        DataCategory::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or(usize::MAX)
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataCategory {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        DataCategory::ALL
            .into_iter()
            .find(|c| c.name() == s || c.alias() == s)
            .ok_or_else(|| MigrateError::Config(format!("unknown data category '{}'", s)))
    }
}

impl TryFrom<String> for DataCategory {
    type Error = MigrateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataCategory> for String {
    fn from(category: DataCategory) -> Self {
        category.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_and_alias() {
        assert_eq!(
            "de.codequake.cms.news".parse::<DataCategory>().unwrap(),
            DataCategory::NewsEntry
        );
        assert_eq!(
            "comment-responses".parse::<DataCategory>().unwrap(),
            DataCategory::NewsCommentResponse
        );
        assert!("blog".parse::<DataCategory>().is_err());
    }

    #[test]
    fn test_identity_less_categories() {
        assert!(!DataCategory::NewsLike.has_identity());
        assert!(!DataCategory::NewsCategoryAcl.has_identity());
        assert!(DataCategory::NewsEntry.has_identity());
    }

    #[test]
    fn test_dependencies_precede_in_declaration_order() {
        for category in DataCategory::ALL {
            for dep in category.dependencies() {
                assert!(dep.ordinal() < category.ordinal(), "{category} -> {dep}");
            }
        }
    }

    #[test]
    fn test_serde_uses_wire_name() {
        let json = serde_json::to_string(&DataCategory::NewsLike).unwrap();
        assert_eq!(json, "\"de.codequake.cms.news.like\"");
        let back: DataCategory = serde_json::from_str("\"likes\"").unwrap();
        assert_eq!(back, DataCategory::NewsLike);
    }
}
