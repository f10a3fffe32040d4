//! File-based run state for resume capability.

use crate::category::DataCategory;
use crate::error::{MigrateError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::path::Path;

type HmacSha256 = Hmac<Sha256>;

/// Run state persisted between invocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run identifier.
    pub run_id: String,

    /// SHA256 hash of the source/destination configuration.
    pub config_hash: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Current run status.
    pub status: RunStatus,

    /// Per-category state, keyed by wire name.
    pub categories: BTreeMap<String, CategoryState>,

    /// When the run finished (if finished).
    pub completed_at: Option<DateTime<Utc>>,

    /// HMAC-SHA256 signature over the state without this field, keyed by
    /// `config_hash`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Per-category state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryState {
    /// Task status.
    pub status: TaskStatus,

    /// Rows reported by the source when the category started.
    pub rows_total: u64,

    /// Rows submitted to the destination.
    pub rows_imported: u64,

    /// Rows skipped because the registry already held them.
    #[serde(default)]
    pub rows_skipped: u64,

    /// Offset of the first page not yet fully processed.
    #[serde(default)]
    pub next_offset: u64,

    /// Offset of the page that failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_offset: Option<u64>,

    /// When the category completed.
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message if failed.
    pub error: Option<String>,
}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// HMAC-SHA256 of a value's JSON form, hex encoded.
pub(crate) fn sign<T: Serialize>(unsigned: &T, key: &str) -> Result<String> {
    let content = serde_json::to_string(unsigned)
        .map_err(|e| MigrateError::State(format!("Failed to serialize for HMAC: {}", e)))?;

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| MigrateError::State(format!("Failed to create HMAC: {}", e)))?;

    mac.update(content.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Write a file atomically: write to a temp file, then rename.
pub(crate) fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

impl RunState {
    /// Create a new run state.
    pub fn new(run_id: String, config_hash: String) -> Self {
        Self {
            run_id,
            config_hash,
            started_at: Utc::now(),
            status: RunStatus::Running,
            categories: BTreeMap::new(),
            completed_at: None,
            hmac: None,
        }
    }

    fn compute_hmac(&self) -> Result<String> {
        let mut unsigned = self.clone();
        unsigned.hmac = None;
        sign(&unsigned, &self.config_hash)
    }

    /// Load state from a file with integrity validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let state: Self = serde_json::from_str(&content)?;

        match &state.hmac {
            Some(stored) if *stored == state.compute_hmac()? => Ok(state),
            Some(_) => Err(MigrateError::State(
                "State file integrity check failed: HMAC mismatch (possible tampering)".to_string(),
            )),
            None => Err(MigrateError::State(
                "State file has no HMAC signature, integrity cannot be verified".to_string(),
            )),
        }
    }

    /// Save state to a file (atomic write with HMAC).
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.hmac = Some(self.compute_hmac()?);

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MigrateError::State(format!("Failed to serialize state: {}", e)))?;

        write_atomic(path.as_ref(), &content)
    }

    /// Validate that the config hash matches for resume.
    pub fn validate_config(&self, config_hash: &str) -> Result<()> {
        if self.config_hash != config_hash {
            return Err(MigrateError::ConfigChanged);
        }
        Ok(())
    }

    /// Get or create category state.
    pub fn get_or_create_category(
        &mut self,
        category: DataCategory,
        rows_total: u64,
    ) -> &mut CategoryState {
        self.categories
            .entry(category.name().to_string())
            .or_insert_with(|| CategoryState::new(rows_total))
    }

    pub fn category(&self, category: DataCategory) -> Option<&CategoryState> {
        self.categories.get(category.name())
    }

    /// Check if a category is completed.
    pub fn is_category_completed(&self, category: DataCategory) -> bool {
        self.category(category)
            .map(|c| c.status == TaskStatus::Completed)
            .unwrap_or(false)
    }

    /// Offset to resume a category at.
    pub fn resume_offset(&self, category: DataCategory) -> u64 {
        self.category(category).map(|c| c.next_offset).unwrap_or(0)
    }

    /// Mark the run as completed.
    pub fn mark_completed(&mut self) {
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run as failed.
    pub fn mark_failed(&mut self) {
        self.status = RunStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run as cancelled.
    pub fn mark_cancelled(&mut self) {
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    /// Reopen a finished run for resumption.
    pub fn reopen(&mut self) {
        self.status = RunStatus::Running;
        self.completed_at = None;
    }
}

impl CategoryState {
    /// Create a new category state.
    pub fn new(rows_total: u64) -> Self {
        Self {
            status: TaskStatus::Pending,
            rows_total,
            rows_imported: 0,
            rows_skipped: 0,
            next_offset: 0,
            failed_offset: None,
            completed_at: None,
            error: None,
        }
    }

    /// Mark the category as in progress.
    pub fn mark_in_progress(&mut self) {
        self.status = TaskStatus::InProgress;
        self.failed_offset = None;
        self.error = None;
    }

    /// Mark the category as completed.
    pub fn mark_completed(&mut self) {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the category as failed at a page offset.
    pub fn mark_failed(&mut self, offset: u64, error: &str) {
        self.status = TaskStatus::Failed;
        self.failed_offset = Some(offset);
        self.error = Some(error.to_string());
    }

    /// Record a fully processed page.
    pub fn record_page(&mut self, next_offset: u64, imported: u64, skipped: u64) {
        self.next_offset = next_offset;
        self.rows_imported += imported;
        self.rows_skipped += skipped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_state_save_load() {
        let mut state = RunState::new("test-run".into(), "abc123".into());
        state.get_or_create_category(DataCategory::NewsEntry, 1000);

        let file = NamedTempFile::new().unwrap();
        state.save(file.path()).unwrap();

        let loaded = RunState::load(file.path()).unwrap();
        assert_eq!(loaded.run_id, "test-run");
        assert_eq!(loaded.config_hash, "abc123");
        assert!(loaded.categories.contains_key("de.codequake.cms.news"));
    }

    #[test]
    fn test_config_validation() {
        let state = RunState::new("test-run".into(), "abc123".into());
        assert!(state.validate_config("abc123").is_ok());
        assert!(matches!(
            state.validate_config("different"),
            Err(MigrateError::ConfigChanged)
        ));
    }

    #[test]
    fn test_tampered_state_is_rejected() {
        let mut state = RunState::new("test-run".into(), "abc123".into());
        state
            .get_or_create_category(DataCategory::NewsLike, 10)
            .record_page(10, 10, 0);

        let file = NamedTempFile::new().unwrap();
        state.save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        std::fs::write(file.path(), content.replace("\"next_offset\": 10", "\"next_offset\": 0"))
            .unwrap();

        let err = RunState::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("HMAC mismatch"));
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_state_json_format_pretty() {
        let mut state = RunState::new("test-run".into(), "hash".into());
        let file = NamedTempFile::new().unwrap();
        state.save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains('\n'), "JSON should be pretty-printed");
        assert!(content.contains("\"run_id\""));
        assert!(content.contains("\"status\": \"running\""));
    }

    #[test]
    fn test_category_progress_round_trip() {
        let mut state = RunState::new("test".into(), "hash".into());
        let category = state.get_or_create_category(DataCategory::NewsComment, 5000);
        category.mark_in_progress();
        category.record_page(200, 150, 50);
        category.record_page(400, 200, 0);

        let file = NamedTempFile::new().unwrap();
        state.save(file.path()).unwrap();

        let loaded = RunState::load(file.path()).unwrap();
        let loaded_category = loaded.category(DataCategory::NewsComment).unwrap();
        assert_eq!(loaded_category.rows_imported, 350);
        assert_eq!(loaded_category.rows_skipped, 50);
        assert_eq!(loaded_category.status, TaskStatus::InProgress);
        assert_eq!(loaded.resume_offset(DataCategory::NewsComment), 400);
        assert_eq!(loaded.resume_offset(DataCategory::NewsLike), 0);
    }

    #[test]
    fn test_state_with_error() {
        let mut state = RunState::new("test".into(), "hash".into());
        state
            .get_or_create_category(DataCategory::NewsAttachment, 1000)
            .mark_failed(300, "table missing");
        state.mark_failed();

        let file = NamedTempFile::new().unwrap();
        state.save(file.path()).unwrap();

        let loaded = RunState::load(file.path()).unwrap();
        let loaded_category = loaded.category(DataCategory::NewsAttachment).unwrap();
        assert_eq!(loaded_category.status, TaskStatus::Failed);
        assert_eq!(loaded_category.failed_offset, Some(300));
        assert_eq!(loaded_category.error.as_deref(), Some("table missing"));
        assert_eq!(loaded.status, RunStatus::Failed);
        assert!(!loaded.is_category_completed(DataCategory::NewsAttachment));
    }
}
