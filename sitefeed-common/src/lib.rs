//! # sitefeed Common Library
//!
//! Shared code for the sitefeed service crates:
//! - Error taxonomy (`Error`, `Result`)
//! - Bootstrap configuration loading (TOML + root folder resolution)
//! - Database initialization and the Site / Review models
//! - Great-circle distance helpers
//! - Timestamp formatting for persisted rows

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod time;

pub use error::{Error, Result};
