//! Legacy-to-new ID registry.
//!
//! Every imported entity with a natural identity is recorded here so later
//! categories can translate their foreign keys. The registry is owned by the
//! orchestrator and lent out by `&mut`; it is persisted next to the bundle
//! with the same integrity scheme as the run state.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::DataCategory;
use crate::error::{MigrateError, Result};
use crate::state::{sign, write_atomic};

/// Mapping from (category, legacy ID) to new ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdRegistry {
    /// Hash of the configuration the mappings were produced under.
    pub config_hash: String,

    /// Per-category mappings, keyed by wire name.
    mappings: BTreeMap<String, BTreeMap<i64, i64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    hmac: Option<String>,
}

impl IdRegistry {
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            config_hash: config_hash.into(),
            mappings: BTreeMap::new(),
            hmac: None,
        }
    }

    /// Record a mapping.
    ///
    /// Recording the same mapping twice is a no-op; mapping a legacy ID to a
    /// different new ID is a conflict and leaves the registry unchanged.
    pub fn record(&mut self, category: DataCategory, legacy_id: i64, new_id: i64) -> Result<()> {
        let entries = self.mappings.entry(category.name().to_string()).or_default();
        match entries.get(&legacy_id) {
            Some(&existing) if existing == new_id => Ok(()),
            Some(&existing) => Err(MigrateError::RegistryConflict {
                category: category.name().to_string(),
                legacy_id,
                existing,
                attempted: new_id,
            }),
            None => {
                entries.insert(legacy_id, new_id);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, category: DataCategory, legacy_id: i64) -> Option<i64> {
        self.mappings
            .get(category.name())
            .and_then(|m| m.get(&legacy_id))
            .copied()
    }

    pub fn contains(&self, category: DataCategory, legacy_id: i64) -> bool {
        self.lookup(category, legacy_id).is_some()
    }

    /// Translate an optional foreign key.
    ///
    /// Absent and zero references stay absent. A reference to an entity that
    /// was never imported is a recovered missing reference: logged and
    /// returned as `None`.
    pub fn lookup_or_null(&self, category: DataCategory, legacy_id: Option<i64>) -> Option<i64> {
        let legacy_id = legacy_id.filter(|id| *id != 0)?;
        let found = self.lookup(category, legacy_id);
        if found.is_none() {
            debug!(
                "Missing reference: {} {} not in registry, importing without it",
                category, legacy_id
            );
        }
        found
    }

    /// Number of mappings recorded for a category.
    pub fn len(&self, category: DataCategory) -> usize {
        self.mappings.get(category.name()).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.values().all(BTreeMap::is_empty)
    }

    /// Highest new ID handed out for a category.
    pub fn max_new_id(&self, category: DataCategory) -> Option<i64> {
        self.mappings
            .get(category.name())
            .and_then(|m| m.values().max())
            .copied()
    }

    fn compute_hmac(&self) -> Result<String> {
        let mut unsigned = self.clone();
        unsigned.hmac = None;
        sign(&unsigned, &self.config_hash)
    }

    /// Load a registry, rejecting tampered files and foreign configurations.
    pub fn load<P: AsRef<Path>>(path: P, config_hash: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let registry: Self = serde_json::from_str(&content)?;

        match &registry.hmac {
            Some(stored) if *stored == registry.compute_hmac()? => {}
            _ => {
                return Err(MigrateError::State(
                    "ID registry integrity check failed: HMAC mismatch (possible tampering)"
                        .to_string(),
                ))
            }
        }
        if registry.config_hash != config_hash {
            return Err(MigrateError::ConfigChanged);
        }
        Ok(registry)
    }

    /// Load the registry at `path`, or start an empty one if none exists.
    pub fn load_or_new<P: AsRef<Path>>(path: P, config_hash: &str) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let registry = Self::load(path, config_hash)?;
            info!(
                "Loaded ID registry from {} ({} categories)",
                path.display(),
                registry.mappings.len()
            );
            Ok(registry)
        } else {
            Ok(Self::new(config_hash))
        }
    }

    /// Save the registry (atomic write with HMAC).
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.hmac = Some(self.compute_hmac()?);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| MigrateError::State(format!("Failed to serialize ID registry: {}", e)))?;
        write_atomic(path.as_ref(), &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_is_idempotent() {
        let mut registry = IdRegistry::new("hash");
        registry.record(DataCategory::NewsEntry, 7, 100).unwrap();
        registry.record(DataCategory::NewsEntry, 7, 100).unwrap();
        assert_eq!(registry.lookup(DataCategory::NewsEntry, 7), Some(100));
        assert_eq!(registry.len(DataCategory::NewsEntry), 1);
    }

    #[test]
    fn test_conflicting_record_fails_and_keeps_first() {
        let mut registry = IdRegistry::new("hash");
        registry.record(DataCategory::NewsEntry, 7, 100).unwrap();
        let err = registry.record(DataCategory::NewsEntry, 7, 101).unwrap_err();
        match err {
            MigrateError::RegistryConflict {
                legacy_id,
                existing,
                attempted,
                ..
            } => {
                assert_eq!((legacy_id, existing, attempted), (7, 100, 101));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(registry.lookup(DataCategory::NewsEntry, 7), Some(100));
    }

    #[test]
    fn test_categories_are_separate_namespaces() {
        let mut registry = IdRegistry::new("hash");
        registry.record(DataCategory::NewsEntry, 1, 10).unwrap();
        registry.record(DataCategory::NewsComment, 1, 20).unwrap();
        assert_eq!(registry.lookup(DataCategory::NewsEntry, 1), Some(10));
        assert_eq!(registry.lookup(DataCategory::NewsComment, 1), Some(20));
        assert_eq!(registry.lookup(DataCategory::NewsLike, 1), None);
    }

    #[test]
    fn test_lookup_or_null() {
        let mut registry = IdRegistry::new("hash");
        registry.record(DataCategory::NewsCategory, 3, 30).unwrap();
        assert_eq!(registry.lookup_or_null(DataCategory::NewsCategory, Some(3)), Some(30));
        assert_eq!(registry.lookup_or_null(DataCategory::NewsCategory, Some(0)), None);
        assert_eq!(registry.lookup_or_null(DataCategory::NewsCategory, None), None);
        assert_eq!(registry.lookup_or_null(DataCategory::NewsCategory, Some(4)), None);
    }

    #[test]
    fn test_max_new_id() {
        let mut registry = IdRegistry::new("hash");
        assert_eq!(registry.max_new_id(DataCategory::NewsEntry), None);
        registry.record(DataCategory::NewsEntry, 1, 12).unwrap();
        registry.record(DataCategory::NewsEntry, 2, 9).unwrap();
        assert_eq!(registry.max_new_id(DataCategory::NewsEntry), Some(12));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");

        let mut registry = IdRegistry::new("hash");
        registry.record(DataCategory::NewsEntry, 5, 50).unwrap();
        registry.save(&path).unwrap();

        let loaded = IdRegistry::load_or_new(&path, "hash").unwrap();
        assert_eq!(loaded.lookup(DataCategory::NewsEntry, 5), Some(50));

        let fresh = IdRegistry::load_or_new(dir.path().join("none.json"), "hash").unwrap();
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_load_rejects_tampering_and_foreign_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("registry.json");

        let mut registry = IdRegistry::new("hash");
        registry.record(DataCategory::NewsEntry, 5, 50).unwrap();
        registry.save(&path).unwrap();

        assert!(matches!(
            IdRegistry::load(&path, "other"),
            Err(MigrateError::ConfigChanged)
        ));

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("50", "51")).unwrap();
        assert!(matches!(
            IdRegistry::load(&path, "hash"),
            Err(MigrateError::State(_))
        ));
    }
}
