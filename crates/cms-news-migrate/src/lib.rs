//! # cms-news-migrate
//!
//! Staged export/import pipeline for moving a legacy CMS news subsystem into
//! a new application.
//!
//! The pipeline provides:
//!
//! - **Dependency-ordered queues** of data categories (categories before
//!   entries, entries before comments, ...)
//! - **Bounded page walks** over each legacy table
//! - **Legacy-to-new ID translation** through a persistent registry
//! - **Category tree reconstruction** with parents imported before children
//! - **Localized text resolution** with fallbacks
//! - **Resume capability** via JSON state files
//!
//! ## Example
//!
//! ```rust,no_run
//! use cms_news_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> cms_news_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let mut orchestrator = Orchestrator::connect(config).await?;
//!     let result = orchestrator.run(CancellationToken::new(), false).await?;
//!     println!("Imported {} rows", result.rows_imported);
//!     Ok(())
//! }
//! ```

pub mod category;
pub mod config;
pub mod destination;
pub mod error;
pub mod export;
pub mod language;
pub mod orchestrator;
pub mod profile;
pub mod queue;
pub mod registry;
pub mod source;
pub mod state;
pub mod tree;

// Re-exports for convenient access
pub use category::DataCategory;
pub use config::{Config, DestinationConfig, MigrationConfig, SourceConfig};
pub use destination::{BundleWriter, DestinationWriter, MemoryWriter, WriterCall};
pub use error::{MigrateError, Result};
pub use export::MigrationRecord;
pub use language::{FieldKind, LanguageResolver, ResolvedText};
pub use orchestrator::{plan, CategoryResult, MigrationResult, Orchestrator, PlannedCategory};
pub use profile::SourceProfile;
pub use queue::build_queue;
pub use registry::IdRegistry;
pub use source::{LegacyRow, LocalizedText, MemorySource, MysqlSource, RowValue, SourceReader};
pub use state::{RunState, RunStatus, TaskStatus};
pub use tree::CategoryTree;
