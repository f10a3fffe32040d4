//! Import bundle on disk.
//!
//! Appends JSON lines to `records.jsonl`, `translations.jsonl` and
//! `updates.jsonl` in the output directory. New IDs are allocated per
//! category from `sequences.json`, which is rewritten on every flush so a
//! resumed run continues numbering where the last one stopped. Nothing is
//! created on disk until the first record, translation or update is written.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use super::DestinationWriter;
use crate::category::DataCategory;
use crate::error::{MigrateError, Result};
use crate::export::MigrationRecord;
use crate::source::LocalizedText;
use crate::state::write_atomic;

const RECORDS_FILE: &str = "records.jsonl";
const TRANSLATIONS_FILE: &str = "translations.jsonl";
const UPDATES_FILE: &str = "updates.jsonl";
const SEQUENCES_FILE: &str = "sequences.json";

#[derive(Serialize)]
struct RecordLine<'a> {
    category: &'a str,
    legacy_id: i64,
    new_id: i64,
    #[serde(flatten)]
    record: &'a MigrationRecord,
}

#[derive(Serialize)]
struct TranslationLine<'a> {
    key: &'a str,
    language_category: &'a str,
    values: &'a LocalizedText,
}

#[derive(Serialize)]
struct UpdateLine<'a> {
    category: &'a str,
    new_id: i64,
    fields: &'a BTreeMap<String, JsonValue>,
}

struct BundleFiles {
    records: BufWriter<File>,
    translations: BufWriter<File>,
    updates: BufWriter<File>,
}

impl BundleFiles {
    fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        info!("Writing import bundle to {}", dir.display());
        Ok(Self {
            records: append(&dir.join(RECORDS_FILE))?,
            translations: append(&dir.join(TRANSLATIONS_FILE))?,
            updates: append(&dir.join(UPDATES_FILE))?,
        })
    }
}

/// Writes the import bundle as JSON lines.
pub struct BundleWriter {
    dir: PathBuf,
    locales: Vec<String>,
    files: Option<BundleFiles>,
    sequences: BTreeMap<String, i64>,
}

impl BundleWriter {
    /// Prepare a bundle directory for appending. An existing sequence file
    /// is read; the directory itself is created on first write.
    pub fn open<P: AsRef<Path>>(dir: P, locales: Vec<String>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let sequences_path = dir.join(SEQUENCES_FILE);
        let sequences = if sequences_path.exists() {
            let content = std::fs::read_to_string(&sequences_path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            dir,
            locales,
            files: None,
            sequences,
        })
    }

    fn files(&mut self) -> Result<&mut BundleFiles> {
        let files = match self.files.take() {
            Some(files) => files,
            None => BundleFiles::create(&self.dir)?,
        };
        Ok(self.files.insert(files))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn next_id(&mut self, category: DataCategory) -> i64 {
        let seq = self.sequences.entry(category.name().to_string()).or_insert(0);
        *seq += 1;
        *seq
    }
}

fn append(path: &Path) -> Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn write_line<T: Serialize>(out: &mut BufWriter<File>, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")
        .map_err(|e| MigrateError::destination(format!("writing bundle: {}", e)))
}

#[async_trait]
impl DestinationWriter for BundleWriter {
    async fn import(
        &mut self,
        category: DataCategory,
        legacy_id: i64,
        record: &MigrationRecord,
    ) -> Result<i64> {
        let new_id = self.next_id(category);
        write_line(
            &mut self.files()?.records,
            &RecordLine {
                category: category.name(),
                legacy_id,
                new_id,
                record,
            },
        )?;
        Ok(new_id)
    }

    async fn create_translation(
        &mut self,
        key: &str,
        language_category: &str,
        values: &LocalizedText,
    ) -> Result<()> {
        write_line(
            &mut self.files()?.translations,
            &TranslationLine {
                key,
                language_category,
                values,
            },
        )
    }

    async fn update(
        &mut self,
        category: DataCategory,
        new_id: i64,
        fields: &BTreeMap<String, JsonValue>,
    ) -> Result<()> {
        write_line(
            &mut self.files()?.updates,
            &UpdateLine {
                category: category.name(),
                new_id,
                fields,
            },
        )
    }

    fn known_locales(&self) -> &[String] {
        &self.locales
    }

    fn reserve_ids_through(&mut self, category: DataCategory, last_id: i64) {
        let seq = self.sequences.entry(category.name().to_string()).or_insert(0);
        if *seq < last_id {
            debug!("{}: continuing IDs after {}", category, last_id);
            *seq = last_id;
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let Some(files) = self.files.as_mut() else {
            return Ok(());
        };
        for out in [&mut files.records, &mut files.translations, &mut files.updates] {
            out.flush()
                .map_err(|e| MigrateError::destination(format!("flushing bundle: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(&self.sequences)?;
        write_atomic(&self.dir.join(SEQUENCES_FILE), &content)
    }

    fn writer_type(&self) -> &str {
        "bundle"
    }
}
