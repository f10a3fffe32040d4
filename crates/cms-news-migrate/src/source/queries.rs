//! SQL for the legacy schemas.
//!
//! Builds every statement the MySQL source issues, per product profile and
//! installation number. Placeholders are MySQL `?`; object type IDs, page
//! bounds and ID lists are always bound, never interpolated.

use crate::category::DataCategory;
use crate::profile::SourceProfile;

/// An object type identified by definition and name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectTypeRef {
    pub definition: &'static str,
    pub name: &'static str,
}

const CATEGORY_TYPE: ObjectTypeRef = ObjectTypeRef {
    definition: "com.woltlab.wcf.category",
    name: "de.codequake.cms.category.news",
};

const ACL_TYPE: ObjectTypeRef = ObjectTypeRef {
    definition: "com.woltlab.wcf.acl",
    name: "de.codequake.cms.category.news",
};

const COMMENT_TYPE: ObjectTypeRef = ObjectTypeRef {
    definition: "com.woltlab.wcf.comment.commentableContent",
    name: "de.codequake.cms.news.comment",
};

const LIKE_TYPE: ObjectTypeRef = ObjectTypeRef {
    definition: "com.woltlab.wcf.like.likeableObject",
    name: "de.codequake.cms.likeableNews",
};

const ATTACHMENT_TYPE: ObjectTypeRef = ObjectTypeRef {
    definition: "com.woltlab.wcf.attachment.objectType",
    name: "de.codequake.cms.news",
};

pub const TAG_TYPE: ObjectTypeRef = ObjectTypeRef {
    definition: "com.woltlab.wcf.tagging.taggableObject",
    name: "de.codequake.cms.news",
};

/// A statement plus the object type it filters on.
///
/// The object type ID is bound `object_type_binds` times ahead of any other
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryQuery {
    pub sql: String,
    pub object_type: Option<ObjectTypeRef>,
    pub object_type_binds: usize,
}

impl CategoryQuery {
    fn plain(sql: String) -> Self {
        Self {
            sql,
            object_type: None,
            object_type_binds: 0,
        }
    }

    fn typed(sql: String, object_type: ObjectTypeRef, binds: usize) -> Self {
        Self {
            sql,
            object_type: Some(object_type),
            object_type_binds: binds,
        }
    }
}

/// How the installation is recognised before any data is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationQuery {
    /// Look up the package version; bind the package name.
    Package { sql: String, package: &'static str },
    /// The statement must merely succeed.
    TableExists { sql: String },
}

/// SQL builder for one legacy installation.
#[derive(Debug, Clone, Copy)]
pub struct LegacyDialect {
    profile: SourceProfile,
    installation: u32,
}

impl LegacyDialect {
    pub fn new(profile: SourceProfile, installation: u32) -> Self {
        Self {
            profile,
            installation,
        }
    }

    pub fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn wcf(&self, table: &str) -> String {
        Self::quote_ident(&format!("wcf{}_{}", self.installation, table))
    }

    fn cms(&self, table: &str) -> String {
        Self::quote_ident(&format!("cms{}_{}", self.installation, table))
    }

    fn is_cnews(&self) -> bool {
        self.profile == SourceProfile::Cnews1x
    }

    pub fn validation(&self) -> ValidationQuery {
        match self.profile.package_name() {
            Some(package) => ValidationQuery::Package {
                sql: format!(
                    "SELECT packageID, packageDir, packageVersion FROM {} WHERE package = ? LIMIT 1",
                    self.wcf("package")
                ),
                package,
            },
            None => ValidationQuery::TableExists {
                sql: format!("SELECT COUNT(*) AS count FROM {}", self.wcf("cnews_news")),
            },
        }
    }

    /// Object type ID by name; binds object type name, then definition name.
    pub fn object_type_id(&self) -> String {
        format!(
            "SELECT objectTypeID FROM {} WHERE objectType = ? AND definitionID = (\
             SELECT definitionID FROM {} WHERE definitionName = ?) LIMIT 1",
            self.wcf("object_type"),
            self.wcf("object_type_definition")
        )
    }

    /// All locale values of a language item; binds the item name.
    pub fn language_item_values(&self) -> String {
        format!(
            "SELECT language_item.languageItemValue, language_item.languageCustomItemValue, \
             language_item.languageUseCustomValue, language.languageCode \
             FROM {} language_item \
             LEFT JOIN {} language ON (language.languageID = language_item.languageID) \
             WHERE language_item.languageItem = ?",
            self.wcf("language_item"),
            self.wcf("language")
        )
    }

    pub fn count(&self, category: DataCategory) -> CategoryQuery {
        if self.is_cnews() {
            let table = match category {
                DataCategory::NewsCategory => "cnews_category",
                DataCategory::NewsComment => "cnews_comment",
                _ => "cnews_news",
            };
            return CategoryQuery::plain(format!(
                "SELECT COUNT(*) AS count FROM {}",
                self.wcf(table)
            ));
        }

        match category {
            DataCategory::NewsCategory => CategoryQuery::typed(
                format!(
                    "SELECT COUNT(*) AS count FROM {} WHERE objectTypeID = ?",
                    self.wcf("category")
                ),
                CATEGORY_TYPE,
                1,
            ),
            DataCategory::NewsCategoryAcl => CategoryQuery::typed(
                format!(
                    "SELECT ((SELECT COUNT(*) FROM {g} option_to_group \
                     LEFT JOIN {o} acl_option ON (acl_option.optionID = option_to_group.optionID) \
                     WHERE acl_option.objectTypeID = ?) + \
                     (SELECT COUNT(*) FROM {u} option_to_user \
                     LEFT JOIN {o} acl_option ON (acl_option.optionID = option_to_user.optionID) \
                     WHERE acl_option.objectTypeID = ?)) AS count",
                    g = self.wcf("acl_option_to_group"),
                    u = self.wcf("acl_option_to_user"),
                    o = self.wcf("acl_option"),
                ),
                ACL_TYPE,
                2,
            ),
            DataCategory::NewsEntry => {
                CategoryQuery::plain(format!("SELECT COUNT(*) AS count FROM {}", self.cms("news")))
            }
            DataCategory::NewsComment => CategoryQuery::typed(
                format!(
                    "SELECT COUNT(*) AS count FROM {} WHERE objectTypeID = ?",
                    self.wcf("comment")
                ),
                COMMENT_TYPE,
                1,
            ),
            DataCategory::NewsCommentResponse => CategoryQuery::typed(
                format!(
                    "SELECT COUNT(*) AS count FROM {} WHERE commentID IN (\
                     SELECT commentID FROM {} WHERE objectTypeID = ?)",
                    self.wcf("comment_response"),
                    self.wcf("comment")
                ),
                COMMENT_TYPE,
                1,
            ),
            DataCategory::NewsLike => CategoryQuery::typed(
                format!(
                    "SELECT COUNT(*) AS count FROM {} WHERE objectTypeID = ?",
                    self.wcf("like")
                ),
                LIKE_TYPE,
                1,
            ),
            DataCategory::NewsAttachment => CategoryQuery::typed(
                format!(
                    "SELECT COUNT(*) AS count FROM {} WHERE objectTypeID = ? AND objectID IS NOT NULL",
                    self.wcf("attachment")
                ),
                ATTACHMENT_TYPE,
                1,
            ),
        }
    }

    /// One page of a category, ordered by primary key.
    ///
    /// Binds the object type ID (if any), then `LIMIT ?`, then `OFFSET ?`.
    /// Column names are normalised across products so record builders see
    /// one shape per category.
    pub fn page(&self, category: DataCategory) -> CategoryQuery {
        if self.is_cnews() {
            return self.cnews_page(category);
        }

        match category {
            DataCategory::NewsCategory => CategoryQuery::typed(
                format!(
                    "SELECT * FROM {} WHERE objectTypeID = ? ORDER BY categoryID LIMIT ? OFFSET ?",
                    self.wcf("category")
                ),
                CATEGORY_TYPE,
                1,
            ),
            DataCategory::NewsCategoryAcl => CategoryQuery::typed(
                format!(
                    "(SELECT acl_option.optionName, acl_option.optionID, option_to_group.objectID, \
                     option_to_group.optionValue, 0 AS userID, option_to_group.groupID \
                     FROM {g} option_to_group \
                     LEFT JOIN {o} acl_option ON (acl_option.optionID = option_to_group.optionID) \
                     WHERE acl_option.objectTypeID = ?) \
                     UNION \
                     (SELECT acl_option.optionName, acl_option.optionID, option_to_user.objectID, \
                     option_to_user.optionValue, option_to_user.userID, 0 AS groupID \
                     FROM {u} option_to_user \
                     LEFT JOIN {o} acl_option ON (acl_option.optionID = option_to_user.optionID) \
                     WHERE acl_option.objectTypeID = ?) \
                     ORDER BY optionID, objectID, groupID, userID LIMIT ? OFFSET ?",
                    g = self.wcf("acl_option_to_group"),
                    u = self.wcf("acl_option_to_user"),
                    o = self.wcf("acl_option"),
                ),
                ACL_TYPE,
                2,
            ),
            DataCategory::NewsEntry => CategoryQuery::plain(format!(
                "SELECT news.*, language.languageCode FROM {} news \
                 LEFT JOIN {} language ON (language.languageID = news.languageID) \
                 ORDER BY news.newsID LIMIT ? OFFSET ?",
                self.cms("news"),
                self.wcf("language")
            )),
            DataCategory::NewsComment => CategoryQuery::typed(
                format!(
                    "SELECT * FROM {} WHERE objectTypeID = ? ORDER BY commentID LIMIT ? OFFSET ?",
                    self.wcf("comment")
                ),
                COMMENT_TYPE,
                1,
            ),
            DataCategory::NewsCommentResponse => CategoryQuery::typed(
                format!(
                    "SELECT * FROM {} WHERE commentID IN (\
                     SELECT commentID FROM {} WHERE objectTypeID = ?) \
                     ORDER BY responseID LIMIT ? OFFSET ?",
                    self.wcf("comment_response"),
                    self.wcf("comment")
                ),
                COMMENT_TYPE,
                1,
            ),
            DataCategory::NewsLike => CategoryQuery::typed(
                format!(
                    "SELECT * FROM {} WHERE objectTypeID = ? ORDER BY likeID LIMIT ? OFFSET ?",
                    self.wcf("like")
                ),
                LIKE_TYPE,
                1,
            ),
            DataCategory::NewsAttachment => CategoryQuery::typed(
                format!(
                    "SELECT * FROM {} WHERE objectTypeID = ? AND objectID IS NOT NULL \
                     ORDER BY attachmentID LIMIT ? OFFSET ?",
                    self.wcf("attachment")
                ),
                ATTACHMENT_TYPE,
                1,
            ),
        }
    }

    fn cnews_page(&self, category: DataCategory) -> CategoryQuery {
        let sql = match category {
            DataCategory::NewsCategory => format!(
                "SELECT categoryID, title, '' AS description, parentID AS parentCategoryID, \
                 0 AS showOrder, 0 AS isDisabled, UNIX_TIMESTAMP() AS time \
                 FROM {} ORDER BY categoryID LIMIT ? OFFSET ?",
                self.wcf("cnews_category")
            ),
            DataCategory::NewsComment => format!(
                "SELECT commentID, newsID AS objectID, userID, username, content AS message, time \
                 FROM {} ORDER BY commentID LIMIT ? OFFSET ?",
                self.wcf("cnews_comment")
            ),
            _ => format!(
                "SELECT newsID, userID, username, topic AS subject, content AS message, time, \
                 enable, categoryID FROM {} ORDER BY newsID LIMIT ? OFFSET ?",
                self.wcf("cnews_news")
            ),
        };
        CategoryQuery::plain(sql)
    }

    /// Tag names for a set of entries; binds the tag object type ID, then
    /// each entry ID. `None` when the product has no tagging.
    pub fn tags(&self, ids: usize) -> Option<String> {
        if self.is_cnews() || ids == 0 {
            return None;
        }
        Some(format!(
            "SELECT tag.name, tag_to_object.objectID FROM {} tag_to_object \
             LEFT JOIN {} tag ON (tag.tagID = tag_to_object.tagID) \
             WHERE tag_to_object.objectTypeID = ? AND tag_to_object.objectID IN ({}) \
             ORDER BY tag_to_object.objectID, tag.tagID",
            self.wcf("tag_to_object"),
            self.wcf("tag"),
            placeholders(ids)
        ))
    }

    /// Category assignments for a set of entries; binds each entry ID.
    /// `None` when the product keeps no assignment table.
    pub fn categories_for(&self, ids: usize) -> Option<String> {
        if ids == 0 {
            return None;
        }
        match self.profile {
            SourceProfile::Fireball1 => Some(format!(
                "SELECT newsID, categoryID FROM {} WHERE newsID IN ({}) ORDER BY newsID, categoryID",
                self.cms("news_to_category"),
                placeholders(ids)
            )),
            SourceProfile::Cnews1x => Some(format!(
                "SELECT newsID, categoryID FROM {} WHERE newsID IN ({}) ORDER BY newsID",
                self.wcf("cnews_news"),
                placeholders(ids)
            )),
            SourceProfile::Fireball2Article => None,
        }
    }
}

/// `?, ?, ?` for an `IN (...)` list.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(LegacyDialect::quote_ident("wcf1_like"), "`wcf1_like`");
        assert_eq!(LegacyDialect::quote_ident("a`b"), "`a``b`");
    }

    #[test]
    fn test_tables_use_installation_number() {
        let dialect = LegacyDialect::new(SourceProfile::Fireball1, 3);
        let q = dialect.page(DataCategory::NewsEntry);
        assert!(q.sql.contains("`cms3_news` news"));
        assert!(q.sql.contains("`wcf3_language` language"));
        assert!(q.sql.ends_with("ORDER BY news.newsID LIMIT ? OFFSET ?"));
        assert!(q.object_type.is_none());
    }

    #[test]
    fn test_acl_union_binds_object_type_twice() {
        let dialect = LegacyDialect::new(SourceProfile::Fireball1, 1);
        let q = dialect.page(DataCategory::NewsCategoryAcl);
        assert_eq!(q.object_type_binds, 2);
        assert_eq!(q.sql.matches("objectTypeID = ?").count(), 2);
        assert!(q.sql.contains("UNION"));
        assert!(q.sql.contains("ORDER BY optionID, objectID, groupID, userID"));
    }

    #[test]
    fn test_cnews_normalises_columns() {
        let dialect = LegacyDialect::new(SourceProfile::Cnews1x, 1);
        let q = dialect.page(DataCategory::NewsEntry);
        assert!(q.sql.contains("topic AS subject"));
        assert!(q.sql.contains("content AS message"));
        assert!(q.sql.contains("`wcf1_cnews_news`"));

        let q = dialect.page(DataCategory::NewsCategory);
        assert!(q.sql.contains("parentID AS parentCategoryID"));
    }

    #[test]
    fn test_validation_query() {
        let dialect = LegacyDialect::new(SourceProfile::Fireball2Article, 1);
        match dialect.validation() {
            ValidationQuery::Package { package, sql } => {
                assert_eq!(package, "de.codequake.cms.news");
                assert!(sql.contains("`wcf1_package`"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            LegacyDialect::new(SourceProfile::Cnews1x, 1).validation(),
            ValidationQuery::TableExists { .. }
        ));
    }

    #[test]
    fn test_in_list_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
        let dialect = LegacyDialect::new(SourceProfile::Fireball1, 1);
        assert!(dialect.tags(0).is_none());
        assert!(dialect.tags(2).unwrap().contains("IN (?, ?)"));
        assert!(LegacyDialect::new(SourceProfile::Cnews1x, 1).tags(2).is_none());
        assert!(LegacyDialect::new(SourceProfile::Fireball2Article, 1)
            .categories_for(2)
            .is_none());
    }
}
