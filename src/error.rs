//! Error types for Gator.

use thiserror::Error;

/// Common error type for Gator.
#[derive(Error, Debug)]
pub enum GatorError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant unless they are
    /// uniqueness violations, which become [`GatorError::Duplicate`].
    #[error("database error: {0}")]
    Database(String),

    /// A uniqueness constraint rejected an insert.
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Feed could not be fetched or parsed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// None of the accepted timestamp formats matched.
    #[error("could not parse timestamp {0:?}")]
    TimeParse(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Fatal error raised before the aggregation loop starts.
    #[error("startup error: {0}")]
    Startup(String),
}

impl GatorError {
    /// Whether this error came from a uniqueness constraint.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, GatorError::Duplicate(_))
    }
}

impl From<sqlx::Error> for GatorError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return GatorError::Duplicate(db_err.message().to_string());
            }
        }
        GatorError::Database(e.to_string())
    }
}

/// Result type alias for Gator operations.
pub type Result<T> = std::result::Result<T, GatorError>;
