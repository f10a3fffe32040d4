//! Legacy rows to normalized migration records.
//!
//! One builder per category. Every foreign key is translated through the ID
//! registry; references to entities that were never imported become `null`.
//! User, group and image IDs are not migrated by this tool and pass through
//! unchanged.

pub mod acl;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::category::DataCategory;
use crate::error::Result;
use crate::profile::SourceProfile;
use crate::registry::IdRegistry;
use crate::source::LegacyRow;

/// Per-locale article content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlock {
    pub title: String,
    pub teaser: String,
    pub content: String,
    #[serde(rename = "imageID")]
    pub image_id: Option<i64>,
    pub tags: Vec<String>,
}

/// Data that accompanies a record but is not a column of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliaryData {
    /// New category IDs the entry belongs to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Location of the attachment file in the legacy installation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_location: Option<String>,

    /// Content per locale code; `"0"` when the entry has no language.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub contents: BTreeMap<String, ContentBlock>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,

    /// ACL option the grant applies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_name: Option<String>,
}

/// A normalized entity ready for the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Destination object type, e.g. `de.codequake.cms.news`.
    pub object_type: String,

    /// Core fields by column name.
    pub fields: BTreeMap<String, JsonValue>,

    pub aux: AuxiliaryData,
}

impl MigrationRecord {
    fn new(object_type: &str) -> Self {
        Self {
            object_type: object_type.to_string(),
            fields: BTreeMap::new(),
            aux: AuxiliaryData::default(),
        }
    }

    fn field(mut self, name: &str, value: impl Into<JsonValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Copy columns from the row unchanged.
    fn copy(mut self, row: &LegacyRow, columns: &[&str]) -> Self {
        for column in columns {
            self.fields.insert(column.to_string(), row.json(column));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }
}

/// Everything a builder needs besides the row itself.
pub struct RecordContext<'a> {
    pub profile: SourceProfile,
    pub registry: &'a IdRegistry,
    pub file_system_path: &'a str,
    /// Tag names per legacy entry ID for the current page.
    pub tags: &'a BTreeMap<i64, Vec<String>>,
    /// Legacy category IDs per legacy entry ID for the current page.
    pub categories: &'a BTreeMap<i64, Vec<i64>>,
}

/// Legacy ID a row is imported under; 0 for identity-less categories.
pub fn legacy_id(category: DataCategory, row: &LegacyRow) -> Result<i64> {
    match category.primary_key() {
        Some(pk) if category.has_identity() => row.int(pk),
        _ => Ok(0),
    }
}

/// Build the record for one legacy row.
pub fn build_record(
    category: DataCategory,
    row: &LegacyRow,
    ctx: &RecordContext<'_>,
) -> Result<MigrationRecord> {
    let object_type = ctx.profile.object_type(category);
    let record = MigrationRecord::new(object_type);

    let record = match category {
        DataCategory::NewsCategory => category_record(record, row, ctx),
        DataCategory::NewsCategoryAcl => acl_record(record, row, ctx),
        DataCategory::NewsEntry => match ctx.profile {
            SourceProfile::Fireball1 => news_record(record, row, ctx)?,
            SourceProfile::Fireball2Article => article_record(record, row, ctx)?,
            SourceProfile::Cnews1x => cnews_record(record, row, ctx)?,
        },
        DataCategory::NewsComment => comment_record(record, row, ctx),
        DataCategory::NewsCommentResponse => record
            .field(
                "commentID",
                nullable(ctx.registry.lookup_or_null(DataCategory::NewsComment, row.opt_id("commentID"))),
            )
            .field("userID", nullable(row.opt_id("userID")))
            .copy(row, &["username", "message", "time"]),
        DataCategory::NewsLike => record
            .field("objectID", entry_ref(row, ctx))
            .field("objectUserID", nullable(row.opt_id("objectUserID")))
            .field("userID", nullable(row.opt_id("userID")))
            .copy(row, &["likeValue", "time"]),
        DataCategory::NewsAttachment => attachment_record(record, row, ctx)?,
    };

    Ok(record)
}

fn nullable(id: Option<i64>) -> JsonValue {
    id.map(JsonValue::from).unwrap_or(JsonValue::Null)
}

fn entry_ref(row: &LegacyRow, ctx: &RecordContext<'_>) -> JsonValue {
    nullable(
        ctx.registry
            .lookup_or_null(DataCategory::NewsEntry, row.opt_id("objectID")),
    )
}

fn category_record(
    record: MigrationRecord,
    row: &LegacyRow,
    ctx: &RecordContext<'_>,
) -> MigrationRecord {
    let parent = ctx
        .registry
        .lookup_or_null(DataCategory::NewsCategory, row.opt_id("parentCategoryID"));
    record
        .field("parentCategoryID", nullable(parent))
        .field("title", row.text("title"))
        .field("description", row.text("description"))
        .field("showOrder", row.int_or("showOrder", 0))
        .field("isDisabled", row.int_or("isDisabled", 0))
        .copy(row, &["time"])
        .field("additionalData", json!({}))
}

fn acl_record(mut record: MigrationRecord, row: &LegacyRow, ctx: &RecordContext<'_>) -> MigrationRecord {
    let category = ctx
        .registry
        .lookup_or_null(DataCategory::NewsCategory, row.opt_id("objectID"));
    record = record
        .field("objectID", nullable(category))
        .field("optionValue", row.int_or("optionValue", 0));
    if let Some(user) = row.opt_id("userID") {
        record = record.field("userID", user);
    }
    if let Some(group) = row.opt_id("groupID") {
        record = record.field("groupID", group);
    }
    record.aux.option_name = Some(row.text("optionName"));
    record
}

fn entry_categories(entry_id: i64, row: &LegacyRow, ctx: &RecordContext<'_>) -> Vec<i64> {
    let legacy: Vec<i64> = match ctx.categories.get(&entry_id) {
        Some(ids) => ids.clone(),
        None => row.opt_id("categoryID").into_iter().collect(),
    };
    legacy
        .into_iter()
        .filter_map(|id| ctx.registry.lookup_or_null(DataCategory::NewsCategory, Some(id)))
        .collect()
}

fn news_record(
    mut record: MigrationRecord,
    row: &LegacyRow,
    ctx: &RecordContext<'_>,
) -> Result<MigrationRecord> {
    let entry_id = row.int("newsID")?;
    record = record
        .field("userID", nullable(row.opt_id("userID")))
        .field("username", row.text("username"))
        .copy(
            row,
            &[
                "subject",
                "message",
                "time",
                "comments",
                "enableSmilies",
                "enableHtml",
                "enableBBCodes",
                "isDisabled",
                "isDeleted",
                "ipAddress",
                "cumulativeLikes",
            ],
        );

    record.aux.categories = entry_categories(entry_id, row, ctx);
    let language = row.text("languageCode");
    if !language.is_empty() {
        record.aux.language_code = Some(language);
    }
    if let Some(tags) = ctx.tags.get(&entry_id) {
        record.aux.tags = tags.clone();
    }
    Ok(record)
}

fn article_record(
    mut record: MigrationRecord,
    row: &LegacyRow,
    ctx: &RecordContext<'_>,
) -> Result<MigrationRecord> {
    let entry_id = row.int("newsID")?;
    record = record
        .field("userID", nullable(row.opt_id("userID")))
        .field("username", row.text("username"))
        .copy(row, &["time", "comments", "cumulativeLikes"]);

    let language = row.text("languageCode");
    let locale = if language.is_empty() { "0".to_string() } else { language };
    record.aux.contents.insert(
        locale,
        ContentBlock {
            title: row.text("subject"),
            teaser: row.text("teaser"),
            content: row.text("message"),
            image_id: row.opt_id("imageID"),
            tags: ctx.tags.get(&entry_id).cloned().unwrap_or_default(),
        },
    );
    Ok(record)
}

fn cnews_record(
    mut record: MigrationRecord,
    row: &LegacyRow,
    ctx: &RecordContext<'_>,
) -> Result<MigrationRecord> {
    let entry_id = row.int("newsID")?;
    record = record
        .field("userID", nullable(row.opt_id("userID")))
        .field("username", row.text("username"))
        .field("subject", row.text("subject"))
        .field("message", cnews_message(&row.text("message")))
        .copy(row, &["time"])
        .field("comments", 0)
        .field("enableSmilies", 0)
        .field("enableHtml", 1)
        .field("enableBBCodes", 0)
        .field("isDisabled", if row.flag("enable") { 0 } else { 1 })
        .field("isDeleted", 0);

    record.aux.categories = entry_categories(entry_id, row, ctx);
    Ok(record)
}

fn comment_record(record: MigrationRecord, row: &LegacyRow, ctx: &RecordContext<'_>) -> MigrationRecord {
    record
        .field("objectID", entry_ref(row, ctx))
        .field("userID", nullable(row.opt_id("userID")))
        .copy(row, &["username", "message", "time"])
        .field("responses", 0)
        .field("responseIDs", json!([]))
}

fn attachment_record(
    mut record: MigrationRecord,
    row: &LegacyRow,
    ctx: &RecordContext<'_>,
) -> Result<MigrationRecord> {
    let attachment_id = row.int("attachmentID")?;
    let hash = row.text("fileHash");
    record = record
        .field("objectID", entry_ref(row, ctx))
        .field("userID", nullable(row.opt_id("userID")))
        .copy(
            row,
            &[
                "filename",
                "filesize",
                "fileType",
                "fileHash",
                "isImage",
                "width",
                "height",
                "downloads",
                "lastDownloadTime",
                "uploadTime",
                "showOrder",
            ],
        );
    record.aux.file_location = Some(attachment_path(ctx.file_system_path, attachment_id, &hash));
    Ok(record)
}

/// Location of an attachment file: `attachments/{hash[0..2]}/{id}-{hash}`,
/// below the legacy installation directory when one is configured.
pub fn attachment_path(file_system_path: &str, attachment_id: i64, file_hash: &str) -> String {
    let bucket: String = file_hash.chars().take(2).collect();
    let relative = format!("attachments/{}/{}-{}", bucket, attachment_id, file_hash);
    if file_system_path.is_empty() {
        relative
    } else if file_system_path.ends_with('/') {
        format!("{}{}", file_system_path, relative)
    } else {
        format!("{}/{}", file_system_path, relative)
    }
}

/// cNews stores plain-text line breaks; the destination expects HTML.
fn cnews_message(message: &str) -> String {
    message
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "<br />\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        registry: IdRegistry,
        tags: BTreeMap<i64, Vec<String>>,
        categories: BTreeMap<i64, Vec<i64>>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = IdRegistry::new("hash");
            registry.record(DataCategory::NewsCategory, 3, 30).unwrap();
            registry.record(DataCategory::NewsEntry, 7, 70).unwrap();
            registry.record(DataCategory::NewsComment, 9, 90).unwrap();
            Self {
                registry,
                tags: BTreeMap::from([(7, vec!["rust".to_string()])]),
                categories: BTreeMap::from([(7, vec![3, 4])]),
            }
        }

        fn ctx(&self, profile: SourceProfile) -> RecordContext<'_> {
            RecordContext {
                profile,
                registry: &self.registry,
                file_system_path: "",
                tags: &self.tags,
                categories: &self.categories,
            }
        }
    }

    #[test]
    fn test_attachment_path() {
        assert_eq!(attachment_path("", 42, "abcdef1234"), "attachments/ab/42-abcdef1234");
        assert_eq!(
            attachment_path("/srv/wcf/", 42, "abcdef1234"),
            "/srv/wcf/attachments/ab/42-abcdef1234"
        );
        assert_eq!(
            attachment_path("/srv/wcf", 42, "abcdef1234"),
            "/srv/wcf/attachments/ab/42-abcdef1234"
        );
    }

    #[test]
    fn test_legacy_id() {
        let row = LegacyRow::new().with("likeID", 5).with("newsID", 8);
        assert_eq!(legacy_id(DataCategory::NewsLike, &row).unwrap(), 0);
        assert_eq!(legacy_id(DataCategory::NewsEntry, &row).unwrap(), 8);
        assert!(legacy_id(DataCategory::NewsComment, &row).is_err());
    }

    #[test]
    fn test_news_record_translates_categories_and_tags() {
        let fixture = Fixture::new();
        let row = LegacyRow::new()
            .with("newsID", 7)
            .with("userID", 0)
            .with("username", "alice")
            .with("subject", "Hello")
            .with("languageCode", "de");

        let record = build_record(DataCategory::NewsEntry, &row, &fixture.ctx(SourceProfile::Fireball1)).unwrap();
        assert_eq!(record.object_type, "de.codequake.cms.news");
        assert_eq!(record.get("userID"), Some(&JsonValue::Null));
        assert_eq!(record.get("subject"), Some(&json!("Hello")));
        // category 4 was never imported
        assert_eq!(record.aux.categories, vec![30]);
        assert_eq!(record.aux.tags, vec!["rust".to_string()]);
        assert_eq!(record.aux.language_code.as_deref(), Some("de"));
    }

    #[test]
    fn test_article_record_content_block() {
        let fixture = Fixture::new();
        let row = LegacyRow::new()
            .with("newsID", 7)
            .with("subject", "Title")
            .with("teaser", "Short")
            .with("message", "Body")
            .with("imageID", 12);

        let record =
            build_record(DataCategory::NewsEntry, &row, &fixture.ctx(SourceProfile::Fireball2Article)).unwrap();
        assert_eq!(record.object_type, "com.woltlab.wcf.article");
        let block = record.aux.contents.get("0").unwrap();
        assert_eq!(block.title, "Title");
        assert_eq!(block.image_id, Some(12));
        assert_eq!(block.tags, vec!["rust".to_string()]);
        assert!(record.get("subject").is_none());
    }

    #[test]
    fn test_cnews_record() {
        let fixture = Fixture::new();
        let row = LegacyRow::new()
            .with("newsID", 11)
            .with("subject", "Topic")
            .with("message", "line one\r\nline two")
            .with("enable", 0)
            .with("categoryID", 3);

        let record = build_record(DataCategory::NewsEntry, &row, &fixture.ctx(SourceProfile::Cnews1x)).unwrap();
        assert_eq!(record.get("message"), Some(&json!("line one<br />\nline two")));
        assert_eq!(record.get("isDisabled"), Some(&json!(1)));
        assert_eq!(record.get("enableHtml"), Some(&json!(1)));
        assert_eq!(record.aux.categories, vec![30]);
    }

    #[test]
    fn test_foreign_keys_translate_or_null() {
        let fixture = Fixture::new();
        let ctx = fixture.ctx(SourceProfile::Fireball1);

        let comment = LegacyRow::new().with("commentID", 1).with("objectID", 7);
        let record = build_record(DataCategory::NewsComment, &comment, &ctx).unwrap();
        assert_eq!(record.get("objectID"), Some(&json!(70)));
        assert_eq!(record.get("responseIDs"), Some(&json!([])));

        let response = LegacyRow::new().with("responseID", 1).with("commentID", 99);
        let record = build_record(DataCategory::NewsCommentResponse, &response, &ctx).unwrap();
        assert_eq!(record.get("commentID"), Some(&JsonValue::Null));
    }

    #[test]
    fn test_acl_record_has_one_holder() {
        let fixture = Fixture::new();
        let row = LegacyRow::new()
            .with("optionName", "canViewNews")
            .with("objectID", 3)
            .with("optionValue", 1)
            .with("groupID", 0)
            .with("userID", 5);

        let record =
            build_record(DataCategory::NewsCategoryAcl, &row, &fixture.ctx(SourceProfile::Fireball1)).unwrap();
        assert_eq!(record.get("objectID"), Some(&json!(30)));
        assert_eq!(record.get("userID"), Some(&json!(5)));
        assert!(record.get("groupID").is_none());
        assert_eq!(record.aux.option_name.as_deref(), Some("canViewNews"));
    }

    #[test]
    fn test_attachment_record_file_location() {
        let fixture = Fixture::new();
        let row = LegacyRow::new()
            .with("attachmentID", 42)
            .with("objectID", 7)
            .with("fileHash", "abcdef1234");

        let record =
            build_record(DataCategory::NewsAttachment, &row, &fixture.ctx(SourceProfile::Fireball1)).unwrap();
        assert_eq!(
            record.aux.file_location.as_deref(),
            Some("attachments/ab/42-abcdef1234")
        );
        assert_eq!(record.get("objectID"), Some(&json!(70)));
    }
}
