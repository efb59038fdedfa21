//! Whitelist handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use vidpipe_models::WhitelistProfile;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_profiles(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<WhitelistProfile>>> {
    user.require_admin()?;
    Ok(Json(state.whitelist.list().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateProfileRequest {
    pub label: String,
    #[serde(default)]
    pub cidr: Option<String>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

pub async fn create_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateProfileRequest>,
) -> ApiResult<Json<WhitelistProfile>> {
    user.require_admin()?;
    Ok(Json(
        state
            .whitelist
            .create(&req.label, req.cidr.as_deref(), req.user_id)
            .await?,
    ))
}

pub async fn delete_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;
    state.whitelist.delete(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}
