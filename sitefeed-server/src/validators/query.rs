//! Listing and radius query parameters
//!
//! Parameters arrive as raw strings; every rule is checked before returning
//! so the caller sees all problems at once.

use chrono::{DateTime, NaiveDate, Utc};
use sitefeed_common::config::QuerySettings;
use sitefeed_common::db::ReviewFilters;
use sitefeed_common::{Error, Result};
use std::collections::HashMap;

/// Validated `GET /api/reviews` parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ListParams {
    pub page: i64,
    pub limit: i64,
    pub filters: ReviewFilters,
}

impl ListParams {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Validated `GET /api/reviews/location` parameters
#[derive(Debug, Clone, PartialEq)]
pub struct LocationParams {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub limit: i64,
}

pub fn validate_list_query(
    params: &HashMap<String, String>,
    settings: &QuerySettings,
) -> Result<ListParams> {
    let mut errors = Vec::new();

    let page = parse_integer(params.get("page"), 1, "page", &mut errors);
    if page < 1 {
        errors.push("page must be at least 1".to_string());
    }
    let limit = parse_integer(params.get("limit"), settings.default_page_size, "limit", &mut errors);
    if limit < 1 || limit > settings.max_page_size {
        errors.push(format!("limit must be between 1 and {}", settings.max_page_size));
    }

    let min_rating = match params.get("rating") {
        None => None,
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(r) if (1.0..=10.0).contains(&r) => Some(r),
            _ => {
                errors.push("rating must be a number between 1 and 10".to_string());
                None
            }
        },
    };

    let created_after = parse_date(params.get("startDate"), "startDate", &mut errors);
    let created_before = parse_date(params.get("endDate"), "endDate", &mut errors);

    if !errors.is_empty() {
        return Err(Error::Validation(errors));
    }

    Ok(ListParams {
        page,
        limit,
        filters: ReviewFilters {
            min_rating,
            created_after,
            created_before,
        },
    })
}

pub fn validate_location_query(
    params: &HashMap<String, String>,
    settings: &QuerySettings,
) -> Result<LocationParams> {
    let mut errors = Vec::new();

    let latitude = parse_required_float(params.get("latitude"), -90.0, 90.0, "latitude", &mut errors);
    let longitude =
        parse_required_float(params.get("longitude"), -180.0, 180.0, "longitude", &mut errors);

    let radius_km = match params.get("radius") {
        None => settings.default_radius_km,
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(r) if r >= settings.min_radius_km && r <= settings.max_radius_km => r,
            _ => {
                errors.push(format!(
                    "radius must be between {} and {} km",
                    settings.min_radius_km, settings.max_radius_km
                ));
                settings.default_radius_km
            }
        },
    };

    let limit = parse_integer(params.get("limit"), settings.default_page_size, "limit", &mut errors);
    if limit < 1 || limit > settings.max_page_size {
        errors.push(format!("limit must be between 1 and {}", settings.max_page_size));
    }

    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) if errors.is_empty() => Ok(LocationParams {
            latitude,
            longitude,
            radius_km,
            limit,
        }),
        _ => Err(Error::Validation(errors)),
    }
}

fn parse_integer(raw: Option<&String>, default: i64, name: &str, errors: &mut Vec<String>) -> i64 {
    match raw {
        None => default,
        Some(raw) => raw.trim().parse::<i64>().unwrap_or_else(|_| {
            errors.push(format!("{} must be an integer", name));
            default
        }),
    }
}

fn parse_required_float(
    raw: Option<&String>,
    min: f64,
    max: f64,
    name: &str,
    errors: &mut Vec<String>,
) -> Option<f64> {
    match raw.and_then(|r| r.trim().parse::<f64>().ok()) {
        Some(v) if v.is_finite() && v >= min && v <= max => Some(v),
        _ => {
            errors.push(format!("{} is required and must be between {} and {}", name, min, max));
            None
        }
    }
}

/// RFC 3339 timestamp or bare `YYYY-MM-DD` (midnight UTC)
fn parse_date(raw: Option<&String>, name: &str, errors: &mut Vec<String>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Some(midnight.and_utc());
    }
    errors.push(format!("{} must be a date (YYYY-MM-DD or RFC 3339)", name));
    None
}
