//! Error types for Summariser Lambda functions.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Summariser Lambda functions.
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request input
    #[error("Validation error: {0}")]
    Validation(String),

    /// A precondition for the operation is not met
    #[error("{0}")]
    BadRequest(String),

    /// No resolvable caller identity
    #[error("{0}")]
    Unauthenticated(String),

    /// Caller does not own the resource
    #[error("{0}")]
    Forbidden(String),

    /// Not found error
    #[error("{0}")]
    NotFound(String),

    /// Non-success response from an external dependency, kept verbatim.
    #[error("{body}")]
    Upstream { status: u16, body: String },

    /// Transport failure talking to an external dependency
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Mail composition or delivery error
    #[error("Mail error: {0}")]
    Mail(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::BadRequest(_) => 400,
            Error::Unauthenticated(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::Upstream { status, .. } => *status,
            Error::Http(_) => 502,
            _ => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
