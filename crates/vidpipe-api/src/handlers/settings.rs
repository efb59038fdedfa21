//! Settings handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use vidpipe_models::{SettingAuditRecord, SettingValue, SystemSetting};

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// Read a whole settings category.
pub async fn get_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(category): Path<String>,
) -> ApiResult<Json<Vec<SystemSetting>>> {
    user.require_admin()?;
    Ok(Json(state.settings.list_category(&category).await?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: SettingValue,
}

/// Audited upsert of one setting.
pub async fn update_setting(
    State(state): State<AppState>,
    user: AuthUser,
    Path((category, key)): Path<(String, String)>,
    Json(req): Json<UpdateSettingRequest>,
) -> ApiResult<Json<SystemSetting>> {
    user.require_admin()?;
    let setting = state
        .settings
        .upsert(&user.subject, &category, &key, req.value)
        .await?;
    Ok(Json(setting))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

fn default_audit_limit() -> i64 {
    50
}

/// Audit trail for one setting coordinate, newest first.
pub async fn setting_audit(
    State(state): State<AppState>,
    user: AuthUser,
    Path((category, key)): Path<(String, String)>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<SettingAuditRecord>>> {
    user.require_admin()?;
    Ok(Json(
        state.settings.audit_log(&category, &key, query.limit).await?,
    ))
}
