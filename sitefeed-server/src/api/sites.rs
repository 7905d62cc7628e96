//! Site lookup (read only)

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

use super::{parse_id, success};
use crate::db::sites;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/sites/:id
pub async fn get_site(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "site")?;
    let site = sites::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Site {} not found", id)))?;

    Ok(success(site))
}
