//! Review submission validation and sanitization
//!
//! Validation never stops at the first problem: every rule runs and the
//! caller receives the complete, ordered list of messages in
//! `Error::Validation`.
//!
//! Numeric fields accept JSON numbers or numeric strings, since multipart
//! form fields always arrive as text. `reason_ids` accepts an array or a
//! string holding a JSON array for the same reason.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use sitefeed_common::db::{NewReview, ReviewUpdate};
use sitefeed_common::{Error, Result};

pub const NAME_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 2000;
pub const ADDRESS_MAX_CHARS: usize = 500;

/// Hard ceiling applied by `sanitize_text`
pub const SANITIZED_MAX_CHARS: usize = 1000;

/// Angle brackets are excluded so an accepted address is already in its stored form
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@<>]+@[^\s@<>]+\.[^\s@<>]+$").expect("email pattern is valid")
});

/// Ten-digit mobile number starting with 6-9, checked after separators are stripped
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[6-9]\d{9}$").expect("phone pattern is valid"));

/// Raw field map as received from the boundary
pub type Fields = Map<String, Value>;

/// Validate a full submission
///
/// Unknown fields are ignored. Returns the unsanitized typed record;
/// compose with [`sanitize_new_review`] before persisting.
pub fn validate_review(fields: &Fields) -> Result<NewReview> {
    let mut errors = Vec::new();

    let name = check_name(fields.get("name"), true, &mut errors);
    let email = check_email(fields.get("email"), true, &mut errors);
    let phone = check_phone(fields.get("phone"), true, &mut errors);
    let rating = check_rating(fields.get("rating"), true, &mut errors);
    let latitude = check_coordinate(fields.get("latitude"), -90.0, 90.0, "latitude", &mut errors);
    let longitude =
        check_coordinate(fields.get("longitude"), -180.0, 180.0, "longitude", &mut errors);
    let description = check_optional_text(
        fields.get("description"),
        DESCRIPTION_MAX_CHARS,
        "Description",
        &mut errors,
    );
    let reason_ids = check_reason_ids(fields.get("reason_ids"), &mut errors);
    let address =
        check_optional_text(fields.get("address"), ADDRESS_MAX_CHARS, "Address", &mut errors);

    if !errors.is_empty() {
        return Err(Error::Validation(errors));
    }

    match (name, email, phone, rating, latitude, longitude) {
        (Some(name), Some(email), Some(phone), Some(rating), Some(latitude), Some(longitude)) => {
            Ok(NewReview {
                name,
                email,
                phone,
                rating,
                description: description.flatten(),
                reason_ids: reason_ids.unwrap_or_default(),
                latitude,
                longitude,
                address: address.flatten(),
            })
        }
        // Every None above pushed an error, so this arm is unreachable in practice
        _ => Err(Error::Validation(vec!["Invalid review submission".to_string()])),
    }
}

/// Validate a partial update
///
/// Only the fields in [`ReviewUpdate::FIELDS`] may appear; any other key is
/// reported by name. A payload with no mutable field at all fails with
/// `NoFieldsProvided`.
pub fn validate_update(fields: &Fields) -> Result<ReviewUpdate> {
    let mut errors = Vec::new();

    for key in fields.keys() {
        if !ReviewUpdate::FIELDS.contains(&key.as_str()) {
            errors.push(format!("\"{}\" is not allowed", key));
        }
    }

    let update = ReviewUpdate {
        name: check_name(fields.get("name"), false, &mut errors),
        email: check_email(fields.get("email"), false, &mut errors),
        phone: check_phone(fields.get("phone"), false, &mut errors),
        rating: check_rating(fields.get("rating"), false, &mut errors),
        // Explicit null clears the description
        description: check_optional_text(
            fields.get("description"),
            DESCRIPTION_MAX_CHARS,
            "Description",
            &mut errors,
        )
        .map(|text| text.unwrap_or_default()),
        reason_ids: check_reason_ids(fields.get("reason_ids"), &mut errors),
    };

    if !errors.is_empty() {
        return Err(Error::Validation(errors));
    }
    if update.is_empty() {
        return Err(Error::NoFieldsProvided);
    }
    Ok(update)
}

/// Strip angle brackets, trim, and cap at [`SANITIZED_MAX_CHARS`]
///
/// Best-effort mitigation for stored markup, not a full HTML sanitizer.
pub fn sanitize_text(input: &str) -> String {
    let stripped: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
    stripped.trim().chars().take(SANITIZED_MAX_CHARS).collect()
}

fn sanitize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|text| sanitize_text(&text))
        .filter(|text| !text.is_empty())
}

/// Apply [`sanitize_text`] to every free-text field of a submission
///
/// The email is not free text; it is stored exactly as validated.
pub fn sanitize_new_review(review: NewReview) -> NewReview {
    NewReview {
        name: sanitize_text(&review.name),
        description: sanitize_optional(review.description),
        address: sanitize_optional(review.address),
        ..review
    }
}

/// Apply [`sanitize_text`] to the free-text fields present in an update
pub fn sanitize_update(update: ReviewUpdate) -> ReviewUpdate {
    ReviewUpdate {
        name: update.name.map(|name| sanitize_text(&name)),
        description: update.description.map(|text| sanitize_text(&text)),
        ..update
    }
}

/// Number or numeric string
fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn is_present(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn check_name(value: Option<&Value>, required: bool, errors: &mut Vec<String>) -> Option<String> {
    if !required && value.is_none() {
        return None;
    }
    match value {
        // Emptiness is judged on the sanitized form so "<>" cannot slip through
        Some(Value::String(s)) if !sanitize_text(s).is_empty() => {
            if s.trim().chars().count() > NAME_MAX_CHARS {
                errors.push(format!("Name must not exceed {} characters", NAME_MAX_CHARS));
                None
            } else {
                Some(s.trim().to_string())
            }
        }
        _ => {
            errors.push("Name is required and must be a non-empty string".to_string());
            None
        }
    }
}

fn check_email(value: Option<&Value>, required: bool, errors: &mut Vec<String>) -> Option<String> {
    if !required && value.is_none() {
        return None;
    }
    match value {
        Some(Value::String(s)) if EMAIL_RE.is_match(s.trim()) => Some(s.trim().to_string()),
        _ => {
            errors.push("A valid email address is required".to_string());
            None
        }
    }
}

fn check_phone(value: Option<&Value>, required: bool, errors: &mut Vec<String>) -> Option<String> {
    if !required && value.is_none() {
        return None;
    }
    let raw = match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let digits = raw.map(|s| s.chars().filter(char::is_ascii_digit).collect::<String>());

    match digits {
        Some(digits) if PHONE_RE.is_match(&digits) => Some(digits),
        _ => {
            errors.push(
                "A valid phone number is required (10 digits starting with 6-9)".to_string(),
            );
            None
        }
    }
}

fn check_rating(value: Option<&Value>, required: bool, errors: &mut Vec<String>) -> Option<f64> {
    if !required && value.is_none() {
        return None;
    }
    match value.and_then(as_number) {
        Some(rating) if (1.0..=10.0).contains(&rating) => Some(rating),
        _ => {
            errors.push("Rating must be a number between 1 and 10".to_string());
            None
        }
    }
}

fn check_coordinate(
    value: Option<&Value>,
    min: f64,
    max: f64,
    label: &str,
    errors: &mut Vec<String>,
) -> Option<f64> {
    match value.and_then(as_number) {
        Some(coord) if (min..=max).contains(&coord) => Some(coord),
        _ => {
            errors.push(format!(
                "Valid {} is required (between {} and {})",
                label, min, max
            ));
            None
        }
    }
}

/// `None` = absent; `Some(None)` = present but null
fn check_optional_text(
    value: Option<&Value>,
    max_chars: usize,
    label: &str,
    errors: &mut Vec<String>,
) -> Option<Option<String>> {
    match value {
        None => None,
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) => {
            if s.chars().count() > max_chars {
                errors.push(format!("{} must not exceed {} characters", label, max_chars));
                None
            } else {
                Some(Some(s.clone()))
            }
        }
        Some(_) => {
            errors.push(format!("{} must be a string", label));
            None
        }
    }
}

fn check_reason_ids(value: Option<&Value>, errors: &mut Vec<String>) -> Option<Vec<i64>> {
    if !is_present(value) {
        return if value.is_some() { Some(Vec::new()) } else { None };
    }

    let parsed;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) if s.trim().is_empty() => return Some(Vec::new()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => {
                parsed = items;
                &parsed
            }
            _ => {
                errors.push("Reason IDs must be an array".to_string());
                return None;
            }
        },
        _ => {
            errors.push("Reason IDs must be an array".to_string());
            return None;
        }
    };

    let ids: Option<Vec<i64>> = items.iter().map(as_positive_integer).collect();
    if ids.is_none() {
        errors.push("All reason IDs must be positive integers".to_string());
    }
    ids
}

fn as_positive_integer(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    n.filter(|n| *n > 0)
}
