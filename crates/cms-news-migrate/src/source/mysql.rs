//! MySQL source for legacy installations.
//!
//! Uses SQLx with a single pooled connection; the migration issues one
//! statement at a time.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row, ValueRef};
use tracing::{debug, info};

use super::queries::{CategoryQuery, LegacyDialect, ObjectTypeRef, ValidationQuery, TAG_TYPE};
use super::{check_package, language_item_value, LegacyRow, LocalizedText, RowValue, SourceReader};
use crate::category::DataCategory;
use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};
use crate::profile::SourceProfile;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Legacy installation in a MySQL database.
pub struct MysqlSource {
    pool: MySqlPool,
    dialect: LegacyDialect,
    profile: SourceProfile,
    object_types: Mutex<HashMap<ObjectTypeRef, i64>>,
}

impl MysqlSource {
    /// Connect to the legacy database.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password);

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::query(e, "connecting to legacy database"))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::query(e, "testing legacy connection"))?;

        let installation = config.installation_number();
        info!(
            "Connected to MySQL source: {}:{}/{} ({}, installation {})",
            config.host,
            config.port,
            config.database,
            config.profile.product_name(),
            installation
        );

        Ok(Self {
            pool,
            dialect: LegacyDialect::new(config.profile, installation),
            profile: config.profile,
            object_types: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve an object type ID, cached per (definition, name). Unknown
    /// object types resolve to 0.
    async fn object_type_id(&self, object_type: ObjectTypeRef) -> Result<i64> {
        let cached = match self.object_types.lock() {
            Ok(cache) => cache.get(&object_type).copied(),
            Err(_) => None,
        };
        if let Some(id) = cached {
            return Ok(id);
        }

        let sql = self.dialect.object_type_id();
        let row = sqlx::query(&sql)
            .bind(object_type.name)
            .bind(object_type.definition)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MigrateError::query(e, "resolving object type"))?;

        let id = match row {
            Some(row) => row_to_legacy(&row).int_or("objectTypeID", 0),
            None => 0,
        };
        if id == 0 {
            debug!(
                "Object type {} ({}) not found, using 0",
                object_type.name, object_type.definition
            );
        }

        if let Ok(mut cache) = self.object_types.lock() {
            cache.insert(object_type, id);
        }
        Ok(id)
    }

    /// Bind the object type ID as many times as the statement needs.
    async fn bind_object_type<'q>(
        &self,
        query: &'q CategoryQuery,
    ) -> Result<Query<'q, MySql, MySqlArguments>> {
        let mut q = sqlx::query(&query.sql);
        if let Some(object_type) = query.object_type {
            let id = self.object_type_id(object_type).await?;
            for _ in 0..query.object_type_binds {
                q = q.bind(id);
            }
        }
        Ok(q)
    }
}

#[async_trait]
impl SourceReader for MysqlSource {
    async fn validate_source_schema(&self) -> Result<()> {
        match self.dialect.validation() {
            ValidationQuery::Package { sql, package } => {
                let row = sqlx::query(&sql)
                    .bind(package)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| {
                        MigrateError::Validation(format!(
                            "Cannot find {} installation: {}",
                            self.profile.product_name(),
                            e
                        ))
                    })?;
                let version = row.map(|r| row_to_legacy(&r).text("packageVersion"));
                check_package(self.profile, version.as_deref())?;
            }
            ValidationQuery::TableExists { sql } => {
                sqlx::query(&sql).fetch_one(&self.pool).await.map_err(|e| {
                    MigrateError::Validation(format!(
                        "Cannot find {} installation: {}",
                        self.profile.product_name(),
                        e
                    ))
                })?;
            }
        }

        info!("Source validated as {}", self.profile.product_name());
        Ok(())
    }

    async fn count(&self, category: DataCategory) -> Result<u64> {
        let query = self.dialect.count(category);
        let q = self.bind_object_type(&query).await?;
        let row = q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::query(e, format!("counting {}", category)))?;
        Ok(row_to_legacy(&row).int_or("count", 0).max(0) as u64)
    }

    async fn read_page(
        &self,
        category: DataCategory,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<LegacyRow>> {
        let query = self.dialect.page(category);
        let rows = self
            .bind_object_type(&query)
            .await?
            .bind(limit as u64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                MigrateError::query(e, format!("reading {} at offset {}", category, offset))
            })?;

        debug!("{}: read {} rows at offset {}", category, rows.len(), offset);
        Ok(rows.iter().map(row_to_legacy).collect())
    }

    async fn language_item_values(&self, item: &str) -> Result<LocalizedText> {
        let sql = self.dialect.language_item_values();
        let rows = sqlx::query(&sql)
            .bind(item)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::query(e, format!("reading language item {}", item)))?;

        Ok(rows
            .iter()
            .filter_map(|r| language_item_value(&row_to_legacy(r)))
            .collect())
    }

    async fn tags_for(&self, entry_ids: &[i64]) -> Result<BTreeMap<i64, Vec<String>>> {
        let mut tags: BTreeMap<i64, Vec<String>> = BTreeMap::new();
        let Some(sql) = self.dialect.tags(entry_ids.len()) else {
            return Ok(tags);
        };

        let type_id = self.object_type_id(TAG_TYPE).await?;
        let mut q = sqlx::query(&sql).bind(type_id);
        for id in entry_ids {
            q = q.bind(*id);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::query(e, "reading tags"))?;

        for row in rows.iter().map(row_to_legacy) {
            let name = row.text("name");
            if name.is_empty() {
                continue;
            }
            tags.entry(row.int("objectID")?).or_default().push(name);
        }
        Ok(tags)
    }

    async fn categories_for(&self, entry_ids: &[i64]) -> Result<BTreeMap<i64, Vec<i64>>> {
        let mut assignments: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
        let Some(sql) = self.dialect.categories_for(entry_ids.len()) else {
            return Ok(assignments);
        };

        let mut q = sqlx::query(&sql);
        for id in entry_ids {
            q = q.bind(*id);
        }
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::query(e, "reading category assignments"))?;

        for row in rows.iter().map(row_to_legacy) {
            if let Some(category_id) = row.opt_id("categoryID") {
                assignments
                    .entry(row.int("newsID")?)
                    .or_default()
                    .push(category_id);
            }
        }
        Ok(assignments)
    }

    fn profile(&self) -> SourceProfile {
        self.profile
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Decode a MySQL row into a [`LegacyRow`].
fn row_to_legacy(row: &MySqlRow) -> LegacyRow {
    let mut out = LegacyRow::new();
    for (i, column) in row.columns().iter().enumerate() {
        out.set(column.name(), decode_value(row, i));
    }
    out
}

fn decode_value(row: &MySqlRow, idx: usize) -> RowValue {
    let is_null: bool = row.try_get_raw(idx).map(|r| r.is_null()).unwrap_or(true);
    if is_null {
        return RowValue::Null;
    }

    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return RowValue::Int(v);
    }
    if let Ok(v) = row.try_get::<u64, _>(idx) {
        return match i64::try_from(v) {
            Ok(v) => RowValue::Int(v),
            Err(_) => RowValue::Text(v.to_string()),
        };
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return RowValue::Float(v);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return RowValue::Text(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return RowValue::Text(String::from_utf8_lossy(&v).into_owned());
    }
    row.try_get_unchecked::<String, _>(idx)
        .map(RowValue::Text)
        .unwrap_or(RowValue::Null)
}
