//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration is resolved in this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal: the service logs a warning and starts
//! with compiled defaults. A TOML file that exists but cannot be parsed is a
//! configuration error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SITEFEED_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "sitefeed.db";

/// Directory (inside the root folder) holding transcoded review images
pub const UPLOADS_DIR: &str = "uploads";

/// Bootstrap configuration loaded from TOML
///
/// These settings cannot change while the service runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the database and uploaded images
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Explicit database path; defaults to `<root_folder>/sitefeed.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Interface the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub images: ImageSettings,

    #[serde(default)]
    pub queries: QuerySettings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: None,
            bind_address: default_bind_address(),
            port: default_port(),
            logging: LoggingConfig::default(),
            images: ImageSettings::default(),
            queries: QuerySettings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Upload limits and transcoding parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSettings {
    /// Largest accepted raw attachment, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Bounding box for transcoded output, in pixels
    #[serde(default = "default_max_dimension")]
    pub max_width: u32,
    #[serde(default = "default_max_dimension")]
    pub max_height: u32,

    /// JPEG quality, 1..=100
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Per-submission attachment cap
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_width: default_max_dimension(),
            max_height: default_max_dimension(),
            quality: default_quality(),
            max_files: default_max_files(),
        }
    }
}

impl ImageSettings {
    /// Reject settings the transcoder cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.quality == 0 || self.quality > 100 {
            return Err(Error::Config(format!(
                "images.quality must be within 1..=100, got {}",
                self.quality
            )));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(Error::Config(
                "images.max_width and images.max_height must be positive".to_string(),
            ));
        }
        // JPEG frames are limited to 16-bit dimensions
        if self.max_width > u16::MAX as u32 || self.max_height > u16::MAX as u32 {
            return Err(Error::Config(format!(
                "images.max_width and images.max_height must not exceed {}",
                u16::MAX
            )));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("images.max_upload_bytes must be positive".to_string()));
        }
        Ok(())
    }

    /// Request body ceiling for multipart uploads (all files plus form fields)
    pub fn request_body_limit(&self) -> usize {
        self.max_upload_bytes
            .saturating_mul(self.max_files.max(1))
            .saturating_add(1024 * 1024)
    }
}

/// Paging and radius bounds for the read paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySettings {
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,
    #[serde(default = "default_min_radius_km")]
    pub min_radius_km: f64,
    #[serde(default = "default_max_radius_km")]
    pub max_radius_km: f64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            default_radius_km: default_radius_km(),
            min_radius_km: default_min_radius_km(),
            max_radius_km: default_max_radius_km(),
        }
    }
}

impl QuerySettings {
    /// Reject bounds the read paths cannot clamp into
    pub fn validate(&self) -> Result<()> {
        if self.max_page_size < 1 {
            return Err(Error::Config(format!(
                "queries.max_page_size must be at least 1, got {}",
                self.max_page_size
            )));
        }
        if !(1..=self.max_page_size).contains(&self.default_page_size) {
            return Err(Error::Config(format!(
                "queries.default_page_size must be within 1..={}, got {}",
                self.max_page_size, self.default_page_size
            )));
        }
        let radii = [self.default_radius_km, self.min_radius_km, self.max_radius_km];
        if radii.iter().any(|r| !r.is_finite()) {
            return Err(Error::Config("queries radius values must be finite".to_string()));
        }
        if self.min_radius_km <= 0.0 {
            return Err(Error::Config(format!(
                "queries.min_radius_km must be positive, got {}",
                self.min_radius_km
            )));
        }
        if self.min_radius_km > self.max_radius_km {
            return Err(Error::Config(format!(
                "queries.min_radius_km ({}) exceeds queries.max_radius_km ({})",
                self.min_radius_km, self.max_radius_km
            )));
        }
        if self.default_radius_km < self.min_radius_km || self.default_radius_km > self.max_radius_km {
            return Err(Error::Config(format!(
                "queries.default_radius_km must be within {}..={}, got {}",
                self.min_radius_km, self.max_radius_km, self.default_radius_km
            )));
        }
        Ok(())
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_max_dimension() -> u32 {
    1920
}

fn default_quality() -> u8 {
    80
}

fn default_max_files() -> usize {
    5
}

fn default_page_size() -> i64 {
    50
}

fn default_max_page_size() -> i64 {
    100
}

fn default_radius_km() -> f64 {
    1.0
}

fn default_min_radius_km() -> f64 {
    0.1
}

fn default_max_radius_km() -> f64 {
    50.0
}

/// Load the bootstrap TOML configuration
///
/// With an explicit path the file must exist. Without one, the platform
/// config locations are searched and compiled defaults are used when none
/// is found.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            path.to_path_buf()
        }
        None => match find_config_file() {
            Some(path) => path,
            None => {
                warn!("No config file found, using compiled defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse and validate TOML configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.images.validate()?;
    config.queries.validate()?;
    Ok(config)
}

/// Platform config file locations, user config first
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("sitefeed").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/sitefeed/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the root folder: CLI → environment → TOML → compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sitefeed"))
        .unwrap_or_else(|| PathBuf::from("./sitefeed_data"))
}

/// Database path: explicit TOML value, else `<root>/sitefeed.db`
pub fn database_path(root_folder: &Path, config: &TomlConfig) -> PathBuf {
    config
        .database_path
        .clone()
        .unwrap_or_else(|| root_folder.join(DATABASE_FILE))
}
