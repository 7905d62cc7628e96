//! Review endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use super::{json_object, parse_id, success, success_with_message};
use crate::db::reviews;
use crate::error::{ApiError, ApiResult};
use crate::pagination::calculate_pagination;
use crate::services::ingest;
use crate::validators::{validate_list_query, validate_location_query};
use crate::AppState;

/// GET /api/reviews
///
/// Newest first; `rating` is a minimum, `startDate`/`endDate` bound
/// `created_at` inclusively.
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let query = validate_list_query(&params, &state.settings.queries)?;
    let page = reviews::find_all(&state.db, query.limit, query.offset(), &query.filters).await?;
    let pagination = calculate_pagination(page.total, query.page, query.limit);

    Ok(Json(json!({
        "success": true,
        "data": page.reviews,
        "pagination": pagination,
    })))
}

/// GET /api/reviews/location
pub async fn reviews_by_location(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let query = validate_location_query(&params, &state.settings.queries)?;
    let located = reviews::find_by_location(
        &state.db,
        query.latitude,
        query.longitude,
        query.radius_km,
        query.limit,
    )
    .await?;

    Ok(success(located))
}

/// GET /api/reviews/statistics
pub async fn review_statistics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = reviews::statistics(&state.db).await?;
    Ok(success(stats))
}

/// GET /api/reviews/:id
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "review")?;
    let review = reviews::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Review {} not found", id)))?;

    Ok(success(review))
}

/// POST /api/reviews
///
/// JSON submission without attachments.
pub async fn create_review(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let fields = json_object(body)?;
    let review = ingest::submit_review(
        &state.db,
        &state.image_store,
        &state.settings.images,
        &fields,
        Vec::new(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        success_with_message(review, "Review submitted successfully"),
    ))
}

/// PUT /api/reviews/:id
pub async fn update_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "review")?;
    let fields = json_object(body)?;
    let review = ingest::update_review(&state.db, id, &fields).await?;

    Ok(success_with_message(review, "Review updated successfully"))
}

/// DELETE /api/reviews/:id
pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id, "review")?;
    ingest::delete_review(&state.db, &state.image_store, id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Review deleted successfully",
    })))
}
