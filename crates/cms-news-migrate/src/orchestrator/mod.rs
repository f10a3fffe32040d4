//! Migration orchestrator - main workflow coordinator.
//!
//! Walks the category queue strictly in order. Every category is counted,
//! then read page by page until a page comes back short; each page is
//! translated, submitted, flushed and checkpointed before the next one is
//! requested.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::category::DataCategory;
use crate::config::Config;
use crate::destination::{BundleWriter, DestinationWriter};
use crate::error::{MigrateError, Result};
use crate::export::{build_record, legacy_id, RecordContext};
use crate::language::LanguageResolver;
use crate::queue::build_queue;
use crate::registry::IdRegistry;
use crate::source::{LegacyRow, MysqlSource, SourceReader};
use crate::state::{RunState, TaskStatus};
use crate::tree::CategoryTree;

/// Migration orchestrator.
pub struct Orchestrator<S, W> {
    config: Config,
    source: S,
    writer: W,
    state_file: Option<PathBuf>,
    state: Option<RunState>,
}

/// One queued category as the plan reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedCategory {
    /// Wire name.
    pub category: String,

    /// Short name accepted by `--select`.
    pub alias: String,

    /// Rows per page.
    pub page_size: usize,

    /// Queued categories this one depends on.
    pub depends_on: Vec<String>,

    /// Source row count, when the source was asked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u64>,
}

/// Per-category outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResult {
    pub category: String,
    pub status: TaskStatus,
    pub rows_total: u64,
    pub rows_imported: u64,
    pub rows_skipped: u64,
    pub duration_seconds: f64,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Categories in the queue.
    pub categories_total: usize,

    /// Categories completed, in this or an earlier run.
    pub categories_completed: usize,

    /// Rows submitted to the destination.
    pub rows_imported: u64,

    /// Rows skipped because an earlier run imported them.
    pub rows_skipped: u64,

    /// Per-category outcome in queue order.
    pub categories: Vec<CategoryResult>,
}

#[derive(Debug, Default, Clone, Copy)]
struct PageOutcome {
    imported: u64,
    skipped: u64,
}

/// Resolve the queue for a configuration without touching any database.
pub fn plan(config: &Config) -> Result<Vec<PlannedCategory>> {
    let queue = build_queue(&config.migration.select, config.source.profile)?;
    Ok(queue
        .iter()
        .map(|&category| PlannedCategory {
            category: category.name().to_string(),
            alias: category.alias().to_string(),
            page_size: config.page_size(category),
            depends_on: category
                .dependencies()
                .iter()
                .filter(|d| queue.contains(d))
                .map(|d| d.name().to_string())
                .collect(),
            rows: None,
        })
        .collect())
}

impl Orchestrator<MysqlSource, BundleWriter> {
    /// Connect to the legacy database and prepare the import bundle. The
    /// bundle is not created on disk until something is written, so a dry
    /// run leaves the output directory untouched.
    pub async fn connect(config: Config) -> Result<Self> {
        let source = MysqlSource::connect(&config.source).await?;
        let writer = BundleWriter::open(
            &config.destination.output_dir,
            config.destination.locales.clone(),
        )?;
        Ok(Self::new(config, source, writer))
    }
}

impl<S, W> Orchestrator<S, W>
where
    S: SourceReader,
    W: DestinationWriter,
{
    /// Create a new orchestrator.
    pub fn new(config: Config, source: S, writer: W) -> Self {
        Self {
            config,
            source,
            writer,
            state_file: None,
            state: None,
        }
    }

    /// Set the state file path for resume capability.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Load existing state for resume.
    pub fn resume(mut self) -> Result<Self> {
        if let Some(ref path) = self.state_file {
            if path.exists() {
                let mut state = RunState::load(path)?;
                state.validate_config(&self.config.hash())?;
                state.reopen();
                info!("Resuming run {} from state file: {:?}", state.run_id, path);
                self.state = Some(state);
            }
        }
        Ok(self)
    }

    /// The destination writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Check that the source is the expected product and version.
    pub async fn validate(&self) -> Result<()> {
        self.source.validate_source_schema().await?;
        info!(
            "Source validated as {} ({})",
            self.config.source.profile.product_name(),
            self.source.db_type()
        );
        Ok(())
    }

    /// Validate the source and count every queued category.
    pub async fn plan_with_counts(&self) -> Result<Vec<PlannedCategory>> {
        self.validate().await?;
        let mut planned = plan(&self.config)?;
        for entry in &mut planned {
            let category: DataCategory = entry.category.parse()?;
            let rows = self.source.count(category).await?;
            info!("{}: {} rows", category, rows);
            entry.rows = Some(rows);
        }
        Ok(planned)
    }

    /// Run the migration.
    ///
    /// Fatal errors are returned annotated with the category and page offset
    /// they happened at; the run state is saved first so a later `resume`
    /// continues from the last completed page.
    pub async fn run(
        &mut self,
        cancel: CancellationToken,
        dry_run: bool,
    ) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let config_hash = self.config.hash();

        let mut state = self
            .state
            .take()
            .unwrap_or_else(|| RunState::new(uuid::Uuid::new_v4().to_string(), config_hash.clone()));

        info!("Starting migration run: {}", state.run_id);

        if dry_run {
            let planned = self.plan_with_counts().await?;
            let categories = planned
                .iter()
                .map(|p| CategoryResult {
                    category: p.category.clone(),
                    status: TaskStatus::Pending,
                    rows_total: p.rows.unwrap_or(0),
                    rows_imported: 0,
                    rows_skipped: 0,
                    duration_seconds: 0.0,
                })
                .collect();
            self.source.close().await;
            return Ok(MigrationResult {
                run_id: state.run_id,
                status: "dry_run".to_string(),
                duration_seconds: timer.elapsed().as_secs_f64(),
                started_at,
                completed_at: Utc::now(),
                categories_total: planned.len(),
                categories_completed: 0,
                rows_imported: 0,
                rows_skipped: 0,
                categories,
            });
        }

        self.validate().await?;
        let queue = build_queue(&self.config.migration.select, self.config.source.profile)?;
        info!(
            "Queue: {}",
            queue.iter().map(|c| c.alias()).collect::<Vec<_>>().join(" -> ")
        );

        let registry_path = self.config.registry_path();
        let mut registry = IdRegistry::load_or_new(&registry_path, &config_hash)?;
        for &category in &queue {
            if let Some(max) = registry.max_new_id(category) {
                self.writer.reserve_ids_through(category, max);
            }
        }

        let resolver = LanguageResolver::new()?;
        let mut durations = BTreeMap::new();

        for &category in &queue {
            if state.is_category_completed(category) {
                info!("{}: already completed, skipping", category);
                continue;
            }

            let category_timer = Instant::now();
            let outcome = if category.is_hierarchical() {
                self.import_tree(category, &mut state, &mut registry, &resolver, &cancel)
                    .await
            } else {
                self.import_pages(category, &mut state, &mut registry, &cancel)
                    .await
            };
            durations.insert(category, category_timer.elapsed().as_secs_f64());

            if let Err(e) = outcome {
                return Err(self.abort(e, category, &mut state, &mut registry).await);
            }

            state
                .get_or_create_category(category, 0)
                .mark_completed();
            self.checkpoint(&mut state, &mut registry)?;
        }

        state.mark_completed();
        self.checkpoint(&mut state, &mut registry)?;
        self.source.close().await;

        let categories: Vec<CategoryResult> = queue
            .iter()
            .filter_map(|&category| {
                state.category(category).map(|s| CategoryResult {
                    category: category.name().to_string(),
                    status: s.status,
                    rows_total: s.rows_total,
                    rows_imported: s.rows_imported,
                    rows_skipped: s.rows_skipped,
                    duration_seconds: durations.get(&category).copied().unwrap_or(0.0),
                })
            })
            .collect();

        let result = MigrationResult {
            run_id: state.run_id.clone(),
            status: "completed".to_string(),
            duration_seconds: timer.elapsed().as_secs_f64(),
            started_at,
            completed_at: Utc::now(),
            categories_total: queue.len(),
            categories_completed: categories
                .iter()
                .filter(|c| c.status == TaskStatus::Completed)
                .count(),
            rows_imported: categories.iter().map(|c| c.rows_imported).sum(),
            rows_skipped: categories.iter().map(|c| c.rows_skipped).sum(),
            categories,
        };

        info!(
            "Migration completed: {} rows imported, {} skipped in {:.2}s",
            result.rows_imported, result.rows_skipped, result.duration_seconds
        );
        Ok(result)
    }

    /// Flat categories: import each page as it is read.
    async fn import_pages(
        &mut self,
        category: DataCategory,
        state: &mut RunState,
        registry: &mut IdRegistry,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let total = self
            .source
            .count(category)
            .await
            .map_err(|e| e.at_page(category.name(), 0))?;
        let limit = self.config.page_size(category);
        let mut offset = state.resume_offset(category);
        info!(
            "{}: {} rows, page size {}, starting at offset {}",
            category, total, limit, offset
        );

        {
            let task = state.get_or_create_category(category, total);
            task.rows_total = total;
            task.mark_in_progress();
        }

        loop {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }

            let rows = self
                .source
                .read_page(category, offset, limit)
                .await
                .map_err(|e| e.at_page(category.name(), offset))?;
            let fetched = rows.len();

            let outcome = self
                .import_page(category, &rows, registry)
                .await
                .map_err(|e| e.at_page(category.name(), offset))?;
            self.writer
                .flush()
                .await
                .map_err(|e| e.at_page(category.name(), offset))?;

            offset += fetched as u64;
            state
                .get_or_create_category(category, total)
                .record_page(offset, outcome.imported, outcome.skipped);
            self.checkpoint(state, registry)?;
            debug!(
                "{}: page done at offset {} ({} imported, {} skipped)",
                category, offset, outcome.imported, outcome.skipped
            );

            if fetched < limit {
                break;
            }
        }

        Ok(())
    }

    async fn import_page(
        &mut self,
        category: DataCategory,
        rows: &[LegacyRow],
        registry: &mut IdRegistry,
    ) -> Result<PageOutcome> {
        let (tags, categories) = if category == DataCategory::NewsEntry && !rows.is_empty() {
            let ids = rows
                .iter()
                .map(|row| legacy_id(category, row))
                .collect::<Result<Vec<_>>>()?;
            (
                self.source.tags_for(&ids).await?,
                self.source.categories_for(&ids).await?,
            )
        } else {
            (BTreeMap::new(), BTreeMap::new())
        };

        let profile = self.source.profile();
        let mut outcome = PageOutcome::default();

        for row in rows {
            let legacy = legacy_id(category, row)?;
            if category.has_identity() && registry.contains(category, legacy) {
                outcome.skipped += 1;
                continue;
            }

            let record = {
                let ctx = RecordContext {
                    profile,
                    registry: &*registry,
                    file_system_path: &self.config.source.file_system_path,
                    tags: &tags,
                    categories: &categories,
                };
                build_record(category, row, &ctx)?
            };

            let new_id = self.writer.import(category, legacy, &record).await?;
            if category.has_identity() {
                registry.record(category, legacy, new_id)?;
            }
            outcome.imported += 1;
        }

        Ok(outcome)
    }

    /// Hierarchical categories: buffer every page, then import parents first.
    async fn import_tree(
        &mut self,
        category: DataCategory,
        state: &mut RunState,
        registry: &mut IdRegistry,
        resolver: &LanguageResolver,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let total = self
            .source
            .count(category)
            .await
            .map_err(|e| e.at_page(category.name(), 0))?;
        let limit = self.config.page_size(category);
        info!("{}: {} rows, buffering in pages of {}", category, total, limit);

        {
            let task = state.get_or_create_category(category, total);
            task.rows_total = total;
            task.mark_in_progress();
        }

        let mut tree = CategoryTree::new();
        let mut offset = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(MigrateError::Cancelled);
            }
            let rows = self
                .source
                .read_page(category, offset, limit)
                .await
                .map_err(|e| e.at_page(category.name(), offset))?;
            let fetched = rows.len();
            tree.buffer_page(rows)
                .map_err(|e| e.at_page(category.name(), offset))?;
            offset += fetched as u64;
            if fetched < limit {
                break;
            }
        }

        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled);
        }

        // The walk restarts from the root on resume, so failures report offset 0.
        let counts = tree
            .import(
                &self.source,
                &mut self.writer,
                registry,
                resolver,
                &self.config.source.file_system_path,
            )
            .await
            .map_err(|e| e.at_page(category.name(), 0))?;
        self.writer
            .flush()
            .await
            .map_err(|e| e.at_page(category.name(), 0))?;

        state
            .get_or_create_category(category, total)
            .record_page(offset, counts.imported, counts.skipped);
        self.checkpoint(state, registry)?;
        Ok(())
    }

    /// Persist run state (if configured) and the registry.
    fn checkpoint(&self, state: &mut RunState, registry: &mut IdRegistry) -> Result<()> {
        if let Some(ref path) = self.state_file {
            state.save(path)?;
        }
        registry.save(self.config.registry_path())
    }

    /// Record a fatal error or cancellation in the run state and hand the
    /// error back for returning. Rows already submitted are flushed before
    /// the registry is saved, so no mapping points past the destination.
    async fn abort(
        &mut self,
        err: MigrateError,
        category: DataCategory,
        state: &mut RunState,
        registry: &mut IdRegistry,
    ) -> MigrateError {
        match &err {
            MigrateError::Cancelled => {
                warn!("{}: cancelled at a page boundary, state saved", category);
                state.mark_cancelled();
            }
            MigrateError::Page { offset, source, .. } => {
                error!("{}: failed at offset {}: {}", category, offset, source);
                state
                    .get_or_create_category(category, 0)
                    .mark_failed(*offset, &source.to_string());
                state.mark_failed();
            }
            other => {
                error!("{}: failed: {}", category, other);
                state
                    .get_or_create_category(category, 0)
                    .mark_failed(0, &other.to_string());
                state.mark_failed();
            }
        }

        if let Err(flush_err) = self.writer.flush().await {
            error!("Failed to flush destination after error: {}", flush_err);
        }
        if let Err(save_err) = self.checkpoint(state, registry) {
            error!("Failed to save state after error: {}", save_err);
        }
        err
    }
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(select: &str) -> Config {
        Config::from_yaml(&format!(
            r#"
source:
  host: localhost
  database: cms
  user: cms
destination:
  output_dir: /tmp/bundle
migration:
  select: [{select}]
"#
        ))
        .unwrap()
    }

    #[test]
    fn test_plan_orders_and_reports_queued_dependencies() {
        let planned = plan(&config("comments, entries, categories")).unwrap();
        let aliases: Vec<&str> = planned.iter().map(|p| p.alias.as_str()).collect();
        assert_eq!(
            aliases,
            vec!["categories", "entries", "comments", "comment-responses"]
        );
        assert_eq!(planned[0].page_size, 300);
        assert_eq!(planned[1].depends_on, vec!["de.codequake.cms.category.news"]);
        assert!(planned.iter().all(|p| p.rows.is_none()));
    }

    #[test]
    fn test_plan_omits_deselected_dependencies() {
        let planned = plan(&config("likes")).unwrap();
        assert_eq!(planned.len(), 1);
        assert!(planned[0].depends_on.is_empty());
    }

    #[test]
    fn test_result_to_json() {
        let result = MigrationResult {
            run_id: "run".into(),
            status: "completed".into(),
            duration_seconds: 1.5,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            categories_total: 1,
            categories_completed: 1,
            rows_imported: 3,
            rows_skipped: 0,
            categories: vec![CategoryResult {
                category: "de.codequake.cms.news".into(),
                status: TaskStatus::Completed,
                rows_total: 3,
                rows_imported: 3,
                rows_skipped: 0,
                duration_seconds: 1.0,
            }],
        };
        let json = result.to_json().unwrap();
        assert!(json.contains("\"status\": \"completed\""));
        assert!(json.contains("\"rows_imported\": 3"));
    }
}
