//! Database access for sitefeed-server
//!
//! Schema creation lives in `sitefeed_common::db::init`; this module holds
//! the queries over it.

pub mod reviews;
pub mod sites;

use sitefeed_common::{Error, Result};
use uuid::Uuid;

/// Parse a UUID stored as TEXT
pub(crate) fn parse_stored_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid stored id '{}': {}", value, e)))
}
