//! Destination writers.

mod bundle;
mod memory;

pub use bundle::BundleWriter;
pub use memory::{MemoryWriter, WriterCall};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::category::DataCategory;
use crate::error::Result;
use crate::export::MigrationRecord;
use crate::source::LocalizedText;

/// Receives normalized records and hands out new IDs.
#[async_trait]
pub trait DestinationWriter: Send {
    /// Import a record and return its new ID. `legacy_id` is 0 for
    /// categories without a natural identity.
    async fn import(
        &mut self,
        category: DataCategory,
        legacy_id: i64,
        record: &MigrationRecord,
    ) -> Result<i64>;

    /// Create a shared translation key with one value per locale.
    async fn create_translation(
        &mut self,
        key: &str,
        language_category: &str,
        values: &LocalizedText,
    ) -> Result<()>;

    /// Patch fields of an already imported entity.
    async fn update(
        &mut self,
        category: DataCategory,
        new_id: i64,
        fields: &BTreeMap<String, JsonValue>,
    ) -> Result<()>;

    /// Locale codes the destination can store. Empty accepts every locale.
    fn known_locales(&self) -> &[String];

    /// Continue ID allocation above `last_id` for a category.
    fn reserve_ids_through(&mut self, _category: DataCategory, _last_id: i64) {}

    /// Make everything written so far durable.
    async fn flush(&mut self) -> Result<()>;

    /// Get the writer type.
    fn writer_type(&self) -> &str;
}
