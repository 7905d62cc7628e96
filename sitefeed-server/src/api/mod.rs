//! HTTP API handlers for sitefeed-server
//!
//! Successful responses share the envelope `{"success": true, "data", "message"?}`;
//! failures are rendered by [`crate::error::ApiError`].

pub mod health;
pub mod reviews;
pub mod sites;
pub mod upload;

pub use health::health_routes;
pub use reviews::{
    create_review, delete_review, get_review, list_reviews, review_statistics,
    reviews_by_location, update_review,
};
pub use sites::get_site;
pub use upload::{process_images, upload_review_with_images};

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::validators::Fields;

/// `{"success": true, "data": …}`
pub(crate) fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// `{"success": true, "data": …, "message": …}`
pub(crate) fn success_with_message<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({ "success": true, "data": data, "message": message }))
}

pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} id: {}", what, raw)))
}

/// Unwrap a JSON body that must be an object
pub(crate) fn json_object(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Fields> {
    let Json(value) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    match value {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiError::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
    }
}
