//! Boundary validation for review submissions and read-path parameters

pub mod query;
pub mod review_input;

pub use query::{validate_list_query, validate_location_query, ListParams, LocationParams};
pub use review_input::{
    sanitize_new_review, sanitize_text, sanitize_update, validate_review, validate_update, Fields,
};
