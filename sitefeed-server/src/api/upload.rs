//! Multipart upload endpoints
//!
//! Image parts are named `images`; every other part is read as a text form
//! field and validated like a JSON submission.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use super::success_with_message;
use crate::error::{ApiError, ApiResult};
use crate::services::{ingest, ImageUpload};
use crate::validators::Fields;
use crate::AppState;
use sitefeed_common::Error;

/// Multipart part name carrying attachments
const IMAGE_PART: &str = "images";

/// POST /api/upload/review-with-images
pub async fn upload_review_with_images(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (fields, uploads) = read_form(multipart).await?;
    let review = ingest::submit_review(
        &state.db,
        &state.image_store,
        &state.settings.images,
        &fields,
        uploads,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        success_with_message(review, "Review with images submitted successfully"),
    ))
}

/// POST /api/upload/images
///
/// Transcodes without persisting and returns inline data URLs.
pub async fn process_images(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Value>> {
    let (_, uploads) = read_form(multipart).await?;
    let images = ingest::process_images(&state.settings.images, uploads).await?;
    let count = images.len();

    Ok(success_with_message(
        json!({ "images": images, "count": count }),
        "Images processed successfully",
    ))
}

/// Split a multipart body into text fields and image uploads
async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(Fields, Vec<ImageUpload>)> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut fields = Fields::new();
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == IMAGE_PART {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(malformed)?;
            debug!(%file_name, %content_type, size = bytes.len(), "Received image part");
            uploads.push(ImageUpload {
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else {
            let text = field.text().await.map_err(malformed)?;
            fields.insert(name, Value::String(text));
        }
    }

    Ok((fields, uploads))
}

fn malformed(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::Common(Error::FileTooLarge(
            "Request body exceeds the upload limit".to_string(),
        ));
    }
    ApiError::BadRequest(format!("Malformed multipart body: {}", err.body_text()))
}
