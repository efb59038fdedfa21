//! Whitelist profile repository.

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use vidpipe_models::WhitelistProfile;

use crate::error::{StoreError, StoreResult};

const PROFILE_COLUMNS: &str = "id, label, cidr, user_id, enabled, created_at, updated_at";

fn row_to_profile(row: &PgRow) -> StoreResult<WhitelistProfile> {
    Ok(WhitelistProfile {
        id: row.try_get("id")?,
        label: row.try_get("label")?,
        cidr: row.try_get("cidr")?,
        user_id: row.try_get("user_id")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct WhitelistRepo {
    pool: PgPool,
}

impl WhitelistRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        label: &str,
        cidr: Option<&str>,
        user_id: Option<Uuid>,
    ) -> StoreResult<WhitelistProfile> {
        let row = sqlx::query(&format!(
            "INSERT INTO whitelist_profiles (id, label, cidr, user_id)
             VALUES ($1, $2, $3, $4)
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(label)
        .bind(cidr)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        row_to_profile(&row)
    }

    pub async fn list(&self) -> StoreResult<Vec<WhitelistProfile>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM whitelist_profiles ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_profile).collect()
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<WhitelistProfile> {
        let row = sqlx::query(&format!(
            "UPDATE whitelist_profiles SET enabled = $2, updated_at = now()
             WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("whitelist profile {}", id)))?;
        row_to_profile(&row)
    }

    pub async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM whitelist_profiles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("whitelist profile {}", id)));
        }
        Ok(())
    }
}
