//! In-memory destination that records every call.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::DestinationWriter;
use crate::category::DataCategory;
use crate::error::{MigrateError, Result};
use crate::export::MigrationRecord;
use crate::source::LocalizedText;

/// One call made against a [`MemoryWriter`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriterCall {
    Import {
        category: DataCategory,
        legacy_id: i64,
        new_id: i64,
        record: MigrationRecord,
    },
    Translation {
        key: String,
        language_category: String,
        values: LocalizedText,
    },
    Update {
        category: DataCategory,
        new_id: i64,
        fields: BTreeMap<String, JsonValue>,
    },
    Flush,
}

/// Destination held in memory.
///
/// New IDs start at `id_base + 1` per category. Imports can be made to fail
/// after a number of successful calls, and updates can be rejected, to
/// simulate a destination outage.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    pub calls: Vec<WriterCall>,
    locales: Vec<String>,
    sequences: BTreeMap<DataCategory, i64>,
    id_base: i64,
    fail_after: Option<usize>,
    rejected_updates: usize,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locales(mut self, locales: &[&str]) -> Self {
        self.locales = locales.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Offset new IDs so they never coincide with legacy IDs in assertions.
    pub fn with_id_base(mut self, base: i64) -> Self {
        self.id_base = base;
        self
    }

    /// Reject every import after `count` successful ones.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Reject the next `count` update calls, then accept again.
    pub fn rejecting_updates(mut self, count: usize) -> Self {
        self.rejected_updates = count;
        self
    }

    /// Imports of a category as `(legacy_id, new_id, record)`.
    pub fn imports(&self, category: DataCategory) -> Vec<(i64, i64, &MigrationRecord)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                WriterCall::Import {
                    category: cat,
                    legacy_id,
                    new_id,
                    record,
                } if *cat == category => Some((*legacy_id, *new_id, record)),
                _ => None,
            })
            .collect()
    }

    pub fn import_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, WriterCall::Import { .. }))
            .count()
    }
}

#[async_trait]
impl DestinationWriter for MemoryWriter {
    async fn import(
        &mut self,
        category: DataCategory,
        legacy_id: i64,
        record: &MigrationRecord,
    ) -> Result<i64> {
        if let Some(limit) = self.fail_after {
            if self.import_count() >= limit {
                return Err(MigrateError::destination(format!(
                    "destination rejected {} {}",
                    category, legacy_id
                )));
            }
        }

        let base = self.id_base;
        let seq = self.sequences.entry(category).or_insert(base);
        *seq += 1;
        let new_id = *seq;

        self.calls.push(WriterCall::Import {
            category,
            legacy_id,
            new_id,
            record: record.clone(),
        });
        Ok(new_id)
    }

    async fn create_translation(
        &mut self,
        key: &str,
        language_category: &str,
        values: &LocalizedText,
    ) -> Result<()> {
        self.calls.push(WriterCall::Translation {
            key: key.to_string(),
            language_category: language_category.to_string(),
            values: values.clone(),
        });
        Ok(())
    }

    async fn update(
        &mut self,
        category: DataCategory,
        new_id: i64,
        fields: &BTreeMap<String, JsonValue>,
    ) -> Result<()> {
        if self.rejected_updates > 0 {
            self.rejected_updates -= 1;
            return Err(MigrateError::destination(format!(
                "destination rejected update of {} {}",
                category, new_id
            )));
        }
        self.calls.push(WriterCall::Update {
            category,
            new_id,
            fields: fields.clone(),
        });
        Ok(())
    }

    fn known_locales(&self) -> &[String] {
        &self.locales
    }

    fn reserve_ids_through(&mut self, category: DataCategory, last_id: i64) {
        let base = self.id_base;
        let seq = self.sequences.entry(category).or_insert(base);
        *seq = (*seq).max(last_id);
    }

    async fn flush(&mut self) -> Result<()> {
        self.calls.push(WriterCall::Flush);
        Ok(())
    }

    fn writer_type(&self) -> &str {
        "memory"
    }
}
