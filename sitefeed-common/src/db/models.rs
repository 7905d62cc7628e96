//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical physical location, keyed by its exact coordinate pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Stored review, with its site's coordinates joined in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub rating: f64,
    pub description: Option<String>,
    pub reason_ids: Vec<i64>,
    /// Stored-image references in submission order
    pub images: Vec<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated, sanitized submission ready for persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub name: String,
    pub email: String,
    /// Ten digits, separators removed
    pub phone: String,
    pub rating: f64,
    pub description: Option<String>,
    pub reason_ids: Vec<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

/// Closed set of mutable review fields; `None` leaves a column untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    /// `Some("")` clears the description
    pub description: Option<String>,
    pub reason_ids: Option<Vec<i64>>,
}

impl ReviewUpdate {
    /// Field names accepted by a partial update
    pub const FIELDS: [&'static str; 6] =
        ["name", "email", "phone", "rating", "description", "reason_ids"];

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.rating.is_none()
            && self.description.is_none()
            && self.reason_ids.is_none()
    }
}

/// Listing filters, combined with AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewFilters {
    pub min_rating: Option<f64>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

/// One page of a filtered listing
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    /// Rows matching the filters, across all pages
    pub total: i64,
    pub has_more: bool,
}

/// Radius-query hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedReview {
    #[serde(flatten)]
    pub review: Review,
    pub distance_km: f64,
}

/// Count of reviews whose rating floors to `rating_range`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingBucket {
    pub rating_range: i64,
    pub count: i64,
}

/// Aggregate statistics over all reviews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatistics {
    pub total_reviews: i64,
    /// Mean rating rounded to 2 decimal places; 0 when there are no reviews
    pub average_rating: f64,
    pub rating_distribution: Vec<RatingBucket>,
    /// Reviews created within the trailing 7 days
    pub recent_reviews: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_update_is_empty() {
        assert!(ReviewUpdate::default().is_empty());
    }

    #[test]
    fn test_update_with_rating_is_not_empty() {
        let update = ReviewUpdate {
            rating: Some(4.0),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn test_statistics_serialize_camel_case() {
        let stats = ReviewStatistics {
            total_reviews: 0,
            average_rating: 0.0,
            rating_distribution: vec![],
            recent_reviews: 0,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalReviews"], 0);
        assert_eq!(json["averageRating"], 0.0);
        assert!(json["ratingDistribution"].is_array());
        assert_eq!(json["recentReviews"], 0);
    }
}
