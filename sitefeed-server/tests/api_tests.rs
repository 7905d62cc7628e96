//! Integration tests for sitefeed-server HTTP endpoints
//!
//! The router is driven in-process with `oneshot`; every test gets its own
//! database and upload directory.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use serde_json::{json, Value};
use sitefeed_common::config::TomlConfig;
use sitefeed_common::db::init_database;
use sitefeed_server::services::ImageStore;
use sitefeed_server::{build_router, AppState};
use std::io::Cursor;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const BOUNDARY: &str = "sitefeed-test-boundary";

/// Test helper: router over a fresh database
async fn setup_app() -> (TempDir, Router) {
    let dir = tempfile::tempdir().expect("Should create temp dir");
    let db = init_database(&dir.path().join("sitefeed.db"))
        .await
        .expect("Should initialize database");
    let store = ImageStore::open(dir.path().join("uploads")).expect("Should open image store");

    let state = AppState::new(db, TomlConfig::default(), store);
    (dir, build_router(state))
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: multipart body with text fields and `images` parts
fn multipart_request(uri: &str, fields: &[(&str, &str)], images: &[(&str, &str, Vec<u8>)]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for (file_name, content_type, bytes) in images {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"images\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let buffer = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(buffer)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Should encode PNG fixture");
    bytes
}

fn submission(name: &str, rating: f64) -> Value {
    json!({
        "name": name,
        "email": "a@b.com",
        "phone": "9876543210",
        "rating": rating,
        "latitude": 12.9,
        "longitude": 77.6
    })
}

async fn create(app: &Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/reviews", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    extract_json(response.into_body()).await["data"].clone()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_reports_database() {
    let (_dir, app) = setup_app().await;

    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "sitefeed-server");
    assert_eq!(body["database"], "connected");
    assert!(body["version"].is_string());
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_create_review_returns_201_envelope() {
    let (_dir, app) = setup_app().await;

    let response = app
        .oneshot(json_request("POST", "/api/reviews", submission("A", 8.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["rating"], 8.0);
    assert_eq!(body["data"]["images"], json!([]));
    assert_eq!(body["data"]["latitude"], 12.9);
    assert!(body["data"]["site_id"].is_string());
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_invalid_submission_lists_every_problem() {
    let (_dir, app) = setup_app().await;
    let mut body = submission("A", 11.0);
    body["email"] = json!("not-an-email");

    let response = app
        .oneshot(json_request("POST", "/api/reviews", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["message"],
        "A valid email address is required, Rating must be a number between 1 and 10"
    );
}

#[tokio::test]
async fn test_non_object_body_is_bad_request() {
    let (_dir, app) = setup_app().await;

    let response = app
        .oneshot(json_request("POST", "/api/reviews", json!([1, 2, 3])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_get_review_and_site() {
    let (_dir, app) = setup_app().await;
    let created = create(&app, submission("A", 6.0)).await;
    let id = created["id"].as_str().unwrap();
    let site_id = created["site_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(test_request("GET", &format!("/api/reviews/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["data"]["id"], id);

    let response = app
        .oneshot(test_request("GET", &format!("/api/sites/{}", site_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["latitude"], 12.9);
}

#[tokio::test]
async fn test_unknown_and_malformed_ids() {
    let (_dir, app) = setup_app().await;

    let response = app
        .clone()
        .oneshot(test_request(
            "GET",
            "/api/reviews/0b7e2a8e-7a4c-4f4e-9d55-3f1c2b9d8e11",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(extract_json(response.into_body()).await["error"]["code"], "NOT_FOUND");

    let response = app
        .oneshot(test_request("GET", "/api/reviews/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(extract_json(response.into_body()).await["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_listing_pagination_metadata() {
    let (_dir, app) = setup_app().await;
    for (name, rating) in [("A", 3.0), ("B", 7.0), ("C", 9.0)] {
        create(&app, submission(name, rating)).await;
    }

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/reviews?limit=2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["name"], "C", "newest first");
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["pagination"]["hasMore"], true);

    let response = app
        .oneshot(test_request("GET", "/api/reviews?rating=7"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["hasMore"], false);
}

#[tokio::test]
async fn test_listing_rejects_out_of_range_limit() {
    let (_dir, app) = setup_app().await;

    let response = app
        .oneshot(test_request("GET", "/api/reviews?limit=1000&page=0"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_location_query() {
    let (_dir, app) = setup_app().await;
    create(&app, submission("A", 5.0)).await;
    create(&app, submission("B", 6.0)).await;

    let response = app
        .clone()
        .oneshot(test_request(
            "GET",
            "/api/reviews/location?latitude=12.9&longitude=77.6&radius=1&limit=10",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let hits = body["data"].as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["name"], "B");
    assert_eq!(hits[0]["distance_km"], 0.0);

    let response = app
        .oneshot(test_request("GET", "/api/reviews/location?latitude=12.9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_statistics_on_empty_and_populated_store() {
    let (_dir, app) = setup_app().await;

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/reviews/statistics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["totalReviews"], 0);
    assert_eq!(body["data"]["averageRating"], 0.0);

    create(&app, submission("A", 8.0)).await;
    create(&app, submission("B", 8.5)).await;

    let response = app
        .oneshot(test_request("GET", "/api/reviews/statistics"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["totalReviews"], 2);
    assert_eq!(body["data"]["averageRating"], 8.25);
    assert_eq!(
        body["data"]["ratingDistribution"],
        json!([{"rating_range": 8, "count": 2}])
    );
    assert_eq!(body["data"]["recentReviews"], 2);
}

// =============================================================================
// Update and delete
// =============================================================================

#[tokio::test]
async fn test_update_review_paths() {
    let (_dir, app) = setup_app().await;
    let created = create(&app, submission("A", 5.0)).await;
    let uri = format!("/api/reviews/{}", created["id"].as_str().unwrap());

    let response = app
        .clone()
        .oneshot(json_request("PUT", &uri, json!({"latitude": 1.0})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        extract_json(response.into_body()).await["error"]["message"],
        "\"latitude\" is not allowed"
    );

    let response = app
        .clone()
        .oneshot(json_request("PUT", &uri, json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        extract_json(response.into_body()).await["error"]["code"],
        "NO_FIELDS_PROVIDED"
    );

    let response = app
        .oneshot(json_request("PUT", &uri, json!({"rating": 9, "description": "Fixed"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["rating"], 9.0);
    assert_eq!(body["data"]["description"], "Fixed");
}

#[tokio::test]
async fn test_update_unknown_review_is_404() {
    let (_dir, app) = setup_app().await;

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/reviews/0b7e2a8e-7a4c-4f4e-9d55-3f1c2b9d8e11",
            json!({"rating": 4}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_then_delete_again() {
    let (_dir, app) = setup_app().await;
    let created = create(&app, submission("A", 5.0)).await;
    let uri = format!("/api/reviews/{}", created["id"].as_str().unwrap());

    let response = app.clone().oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await["success"], true);

    let response = app.oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Uploads
// =============================================================================

#[tokio::test]
async fn test_multipart_review_with_image_is_served_back() {
    let (_dir, app) = setup_app().await;

    let request = multipart_request(
        "/api/upload/review-with-images",
        &[
            ("name", "A"),
            ("email", "a@b.com"),
            ("phone", "98765 43210"),
            ("rating", "8"),
            ("latitude", "12.9"),
            ("longitude", "77.6"),
            ("reason_ids", "[1,2]"),
        ],
        &[("photo.png", "image/png", png_bytes(64, 48))],
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["phone"], "9876543210");
    assert_eq!(body["data"]["reason_ids"], json!([1, 2]));
    let reference = body["data"]["images"][0].as_str().unwrap().to_string();
    assert!(reference.starts_with("/uploads/"));

    let response = app.oneshot(test_request("GET", &reference)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
}

#[tokio::test]
async fn test_multipart_rejects_disallowed_type() {
    let (_dir, app) = setup_app().await;

    let request = multipart_request(
        "/api/upload/review-with-images",
        &[
            ("name", "A"),
            ("email", "a@b.com"),
            ("phone", "9876543210"),
            ("rating", "8"),
            ("latitude", "12.9"),
            ("longitude", "77.6"),
        ],
        &[("notes.txt", "text/plain", b"hello".to_vec())],
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        extract_json(response.into_body()).await["error"]["code"],
        "INVALID_FILE_TYPE"
    );
}

#[tokio::test]
async fn test_process_images_endpoint() {
    let (_dir, app) = setup_app().await;

    let request = multipart_request(
        "/api/upload/images",
        &[],
        &[
            ("one.png", "image/png", png_bytes(30, 20)),
            ("two.png", "image/png", png_bytes(20, 30)),
        ],
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["data"]["count"], 2);
    assert_eq!(body["data"]["images"][0]["originalName"], "one.png");
    assert!(body["data"]["images"][1]["base64"]
        .as_str()
        .unwrap()
        .starts_with("data:image/jpeg;base64,"));

    let request = multipart_request("/api/upload/images", &[], &[]);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(extract_json(response.into_body()).await["error"]["code"], "NO_FILES");
}
