//! Review repository
//!
//! Reviews are always read joined with their site so callers get the
//! coordinates without a second lookup. `reason_ids` and `images` are stored
//! as JSON array text.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::parse_stored_uuid;
use sitefeed_common::db::{
    LocatedReview, NewReview, RatingBucket, Review, ReviewFilters, ReviewPage, ReviewStatistics,
    ReviewUpdate, Site,
};
use sitefeed_common::geo::{haversine_km, BoundingBox};
use sitefeed_common::{time, Error, Result};

const SELECT_REVIEWS: &str = r#"
    SELECT r.id, r.site_id, r.name, r.email, r.phone, r.rating, r.description,
           r.reason_ids, r.images, r.created_at, r.updated_at,
           s.latitude, s.longitude, s.address
    FROM reviews r
    JOIN sites s ON s.id = r.site_id
"#;

/// Window counted as "recent" by [`statistics`]
const RECENT_WINDOW_DAYS: i64 = 7;

/// Insert a review for an already-resolved site
///
/// Runs on the caller's connection so it can share a transaction with
/// [`super::sites::resolve_site`].
pub async fn create(
    conn: &mut SqliteConnection,
    site: &Site,
    review: &NewReview,
    images: &[String],
) -> Result<Review> {
    let id = Uuid::new_v4();
    let now = time::now();
    let now_text = time::to_db(&now);

    sqlx::query(
        r#"
        INSERT INTO reviews (
            id, site_id, name, email, phone, rating, description,
            reason_ids, images, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id.to_string())
    .bind(site.id.to_string())
    .bind(&review.name)
    .bind(&review.email)
    .bind(&review.phone)
    .bind(review.rating)
    .bind(review.description.as_deref())
    .bind(to_json(&review.reason_ids)?)
    .bind(to_json(images)?)
    .bind(&now_text)
    .bind(&now_text)
    .execute(&mut *conn)
    .await
    .map_err(Error::from_storage)?;

    debug!(review_id = %id, site_id = %site.id, "Inserted review");

    Ok(Review {
        id,
        site_id: site.id,
        name: review.name.clone(),
        email: review.email.clone(),
        phone: review.phone.clone(),
        rating: review.rating,
        description: review.description.clone(),
        reason_ids: review.reason_ids.clone(),
        images: images.to_vec(),
        latitude: site.latitude,
        longitude: site.longitude,
        address: site.address.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Review>> {
    let row = sqlx::query(&format!("{} WHERE r.id = ?", SELECT_REVIEWS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(review_from_row).transpose()
}

/// Newest-first page of reviews matching `filters`
///
/// `total` counts every match under the same filters, so `has_more` is exact.
pub async fn find_all(
    pool: &SqlitePool,
    limit: i64,
    offset: i64,
    filters: &ReviewFilters,
) -> Result<ReviewPage> {
    let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM reviews r WHERE 1 = 1");
    push_filters(&mut count_query, filters);
    let total: i64 = count_query
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    let mut query = QueryBuilder::<Sqlite>::new(format!("{} WHERE 1 = 1", SELECT_REVIEWS));
    push_filters(&mut query, filters);
    query
        .push(" ORDER BY r.created_at DESC, r.rowid DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    let rows = query.build().fetch_all(pool).await?;
    let reviews = rows.iter().map(review_from_row).collect::<Result<Vec<_>>>()?;

    let has_more = offset + (reviews.len() as i64) < total;
    Ok(ReviewPage {
        reviews,
        total,
        has_more,
    })
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filters: &ReviewFilters) {
    if let Some(min_rating) = filters.min_rating {
        query.push(" AND r.rating >= ").push_bind(min_rating);
    }
    if let Some(after) = filters.created_after {
        query.push(" AND r.created_at >= ").push_bind(time::to_db(&after));
    }
    if let Some(before) = filters.created_before {
        query.push(" AND r.created_at <= ").push_bind(time::to_db(&before));
    }
}

/// Reviews strictly within `radius_km` of a point, nearest first
///
/// A bounding box narrows the scan in SQL; the exact haversine distance is
/// computed here. Ties on distance keep newest-first order.
pub async fn find_by_location(
    pool: &SqlitePool,
    latitude: f64,
    longitude: f64,
    radius_km: f64,
    limit: i64,
) -> Result<Vec<LocatedReview>> {
    let bbox = BoundingBox::around(latitude, longitude, radius_km);

    let rows = sqlx::query(&format!(
        r#"{}
        WHERE s.latitude BETWEEN ? AND ?
          AND s.longitude BETWEEN ? AND ?
        ORDER BY r.created_at DESC, r.rowid DESC
        "#,
        SELECT_REVIEWS
    ))
    .bind(bbox.min_lat)
    .bind(bbox.max_lat)
    .bind(bbox.min_lon)
    .bind(bbox.max_lon)
    .fetch_all(pool)
    .await?;

    let mut located = Vec::new();
    for row in &rows {
        let review = review_from_row(row)?;
        let distance_km = haversine_km(latitude, longitude, review.latitude, review.longitude);
        if distance_km < radius_km {
            located.push(LocatedReview {
                review,
                distance_km,
            });
        }
    }

    // Stable sort keeps the newest-first order among equal distances
    located.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    located.truncate(usize::try_from(limit).unwrap_or(0));

    debug!(
        latitude,
        longitude,
        radius_km,
        candidates = rows.len(),
        matched = located.len(),
        "Location query"
    );
    Ok(located)
}

/// Apply a partial update and return the refreshed review
///
/// An empty description clears the column. `updated_at` is refreshed.
pub async fn update(pool: &SqlitePool, id: Uuid, changes: &ReviewUpdate) -> Result<Review> {
    if changes.is_empty() {
        return Err(Error::NoFieldsProvided);
    }

    let mut query = QueryBuilder::<Sqlite>::new("UPDATE reviews SET ");
    let mut assignments = query.separated(", ");
    if let Some(name) = &changes.name {
        assignments.push("name = ").push_bind_unseparated(name.clone());
    }
    if let Some(email) = &changes.email {
        assignments.push("email = ").push_bind_unseparated(email.clone());
    }
    if let Some(phone) = &changes.phone {
        assignments.push("phone = ").push_bind_unseparated(phone.clone());
    }
    if let Some(rating) = changes.rating {
        assignments.push("rating = ").push_bind_unseparated(rating);
    }
    if let Some(description) = &changes.description {
        let value = (!description.is_empty()).then(|| description.clone());
        assignments.push("description = ").push_bind_unseparated(value);
    }
    if let Some(reason_ids) = &changes.reason_ids {
        assignments
            .push("reason_ids = ")
            .push_bind_unseparated(to_json(reason_ids)?);
    }
    assignments
        .push("updated_at = ")
        .push_bind_unseparated(time::to_db(&time::now()));

    query.push(" WHERE id = ").push_bind(id.to_string());

    let result = query
        .build()
        .execute(pool)
        .await
        .map_err(Error::from_storage)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Review {} not found", id)));
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Review {} not found", id)))
}

/// Delete a review; returns whether a row was removed
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM reviews WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Whether any review still lists `reference` among its images
pub async fn image_referenced(pool: &SqlitePool, reference: &str) -> Result<bool> {
    let referenced: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM reviews, json_each(reviews.images)
            WHERE json_each.value = ?
        )
        "#,
    )
    .bind(reference)
    .fetch_one(pool)
    .await?;

    Ok(referenced)
}

pub async fn statistics(pool: &SqlitePool) -> Result<ReviewStatistics> {
    statistics_at(pool, time::now()).await
}

/// Statistics with "recent" measured back from `now`
pub async fn statistics_at(pool: &SqlitePool, now: DateTime<Utc>) -> Result<ReviewStatistics> {
    let recent_since = time::to_db(&(now - Duration::days(RECENT_WINDOW_DAYS)));

    let (total_reviews, average, rating_distribution, recent_reviews) = tokio::try_join!(
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews").fetch_one(pool),
        sqlx::query_scalar::<_, Option<f64>>("SELECT AVG(rating) FROM reviews").fetch_one(pool),
        sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT CAST(rating AS INTEGER) AS rating_range, COUNT(*) AS count
            FROM reviews
            GROUP BY rating_range
            ORDER BY rating_range
            "#,
        )
        .fetch_all(pool),
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE created_at >= ?")
            .bind(&recent_since)
            .fetch_one(pool),
    )?;

    Ok(ReviewStatistics {
        total_reviews,
        average_rating: average.map(round2).unwrap_or(0.0),
        rating_distribution: rating_distribution
            .into_iter()
            .map(|(rating_range, count)| RatingBucket {
                rating_range,
                count,
            })
            .collect(),
        recent_reviews,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Internal(format!("JSON encode failed: {}", e)))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, text: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| Error::Internal(format!("Malformed {} column: {}", column, e)))
}

fn review_from_row(row: &SqliteRow) -> Result<Review> {
    let id: String = row.try_get("id")?;
    let site_id: String = row.try_get("site_id")?;
    let reason_ids: String = row.try_get("reason_ids")?;
    let images: String = row.try_get("images")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Review {
        id: parse_stored_uuid(&id)?,
        site_id: parse_stored_uuid(&site_id)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        rating: row.try_get("rating")?,
        description: row.try_get("description")?,
        reason_ids: from_json("reason_ids", &reason_ids)?,
        images: from_json("images", &images)?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        address: row.try_get("address")?,
        created_at: time::from_db(&created_at)?,
        updated_at: time::from_db(&updated_at)?,
    })
}
