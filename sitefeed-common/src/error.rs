//! Common error types for sitefeed

use thiserror::Error;

/// Common result type for sitefeed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the ingestion engine and the HTTP layer
#[derive(Error, Debug)]
pub enum Error {
    /// Database connectivity or query failure (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested review or site not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// One message per violated field rule, in evaluation order
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    /// Attachment content type outside the image allow-list
    #[error("Invalid media type: {0}")]
    InvalidMediaType(String),

    /// Attachment larger than the configured upload limit
    #[error("File too large: {0}")]
    FileTooLarge(String),

    /// More attachments than the per-submission cap
    #[error("Too many files: {0}")]
    TooManyFiles(String),

    /// Upload endpoint called without any image parts
    #[error("No images provided")]
    NoFilesProvided,

    /// Decode/resize/encode failure for a named attachment
    #[error("Failed to process image: {0}")]
    ImageProcessing(String),

    /// Storage constraint violation (unique, foreign key, not-null, check)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Partial update carrying none of the mutable fields
    #[error("At least one valid field must be provided for update")]
    NoFieldsProvided,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Classify a storage error, separating constraint violations (client
    /// fault) from infrastructure failures.
    pub fn from_storage(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        if let sqlx::Error::Database(db_err) = &err {
            let constraint = match db_err.kind() {
                ErrorKind::UniqueViolation => Some("Duplicate entry"),
                ErrorKind::ForeignKeyViolation => Some("Referenced record not found"),
                ErrorKind::NotNullViolation => Some("Required field missing"),
                ErrorKind::CheckViolation => Some("Value out of range"),
                _ => None,
            };
            if let Some(kind) = constraint {
                return Error::Persistence(format!("{}: {}", kind, db_err.message()));
            }
        }
        Error::Database(err)
    }

    /// True for SQLite writer contention, which is safe to retry
    pub fn is_lock_error(&self) -> bool {
        match self {
            Error::Database(db_err) => db_err.to_string().contains("database is locked"),
            _ => false,
        }
    }
}
