//! System settings with an audited upsert.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use vidpipe_models::{SettingAuditRecord, SettingValue, SystemSetting};

use crate::error::StoreResult;

fn row_to_setting(row: &PgRow) -> StoreResult<SystemSetting> {
    let value: serde_json::Value = row.try_get("value")?;
    Ok(SystemSetting {
        id: row.try_get("id")?,
        category: row.try_get("category")?,
        key: row.try_get("key")?,
        value: serde_json::from_value(value)?,
        version: row.try_get("version")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_audit(row: &PgRow) -> StoreResult<SettingAuditRecord> {
    let old: Option<serde_json::Value> = row.try_get("old")?;
    let new: serde_json::Value = row.try_get("new")?;
    Ok(SettingAuditRecord {
        id: row.try_get("id")?,
        who: row.try_get("who")?,
        category: row.try_get("category")?,
        key: row.try_get("key")?,
        old: old.map(serde_json::from_value).transpose()?,
        new: serde_json::from_value(new)?,
        when: row.try_get("at")?,
    })
}

/// Repository for `(category, key)` settings and their audit trail.
#[derive(Clone)]
pub struct SettingsRepo {
    pool: PgPool,
}

impl SettingsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, category: &str, key: &str) -> StoreResult<Option<SystemSetting>> {
        let row = sqlx::query(
            "SELECT id, category, key, value, version, updated_at
             FROM system_settings WHERE category = $1 AND key = $2",
        )
        .bind(category)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_setting).transpose()
    }

    pub async fn list_category(&self, category: &str) -> StoreResult<Vec<SystemSetting>> {
        let rows = sqlx::query(
            "SELECT id, category, key, value, version, updated_at
             FROM system_settings WHERE category = $1 ORDER BY key",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_setting).collect()
    }

    /// Upsert a setting and write the audit record in the same transaction.
    /// The version bumps on every write, including no-op value rewrites.
    pub async fn upsert(
        &self,
        who: &str,
        category: &str,
        key: &str,
        value: SettingValue,
    ) -> StoreResult<SystemSetting> {
        let mut tx = self.pool.begin().await?;

        let old: Option<serde_json::Value> = sqlx::query(
            "SELECT value FROM system_settings WHERE category = $1 AND key = $2 FOR UPDATE",
        )
        .bind(category)
        .bind(key)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get("value"))
        .transpose()?;

        let new_value = serde_json::to_value(&value)?;

        let row = sqlx::query(
            "INSERT INTO system_settings (id, category, key, value)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (category, key)
             DO UPDATE SET value = EXCLUDED.value,
                           version = system_settings.version + 1,
                           updated_at = now()
             RETURNING id, category, key, value, version, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(category)
        .bind(key)
        .bind(&new_value)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO setting_audit_log (id, who, category, key, old, new)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(who)
        .bind(category)
        .bind(key)
        .bind(&old)
        .bind(&new_value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(who, category, key, "Setting updated");
        row_to_setting(&row)
    }

    /// Audit entries for one coordinate, newest first.
    pub async fn audit_log(
        &self,
        category: &str,
        key: &str,
        limit: i64,
    ) -> StoreResult<Vec<SettingAuditRecord>> {
        let rows = sqlx::query(
            "SELECT id, who, category, key, old, new, at
             FROM setting_audit_log
             WHERE category = $1 AND key = $2
             ORDER BY at DESC LIMIT $3",
        )
        .bind(category)
        .bind(key)
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_audit).collect()
    }

    /// Read an integer setting with a fallback default. A value of the wrong
    /// type is treated as absent rather than an error.
    pub async fn get_i64_or(&self, category: &str, key: &str, default: i64) -> StoreResult<i64> {
        Ok(self
            .get(category, key)
            .await?
            .and_then(|s| s.value.as_i64())
            .unwrap_or(default))
    }
}
