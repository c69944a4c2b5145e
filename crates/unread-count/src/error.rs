//! Unread count error types.

use thiserror::Error;

/// Error type for the unread count provider and its API client.
#[derive(Error, Debug)]
pub enum UnreadError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Credential storage error
    #[error("Storage error: {0}")]
    Storage(#[from] inbox_storage::StorageError),

    /// No session token is stored
    #[error("No session token available")]
    MissingCredential,

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Context accessed outside of a provider scope
    #[error("use_unread_count must be used within an UnreadCountProvider scope")]
    OutsideProvider,
}

impl UnreadError {
    /// Returns true if a later attempt might succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        match self {
            UnreadError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            UnreadError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using UnreadError.
pub type UnreadResult<T> = Result<T, UnreadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_5xx_is_transient() {
        let err = UnreadError::Api {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn test_api_4xx_is_not_transient() {
        let err = UnreadError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_misuse_is_not_transient() {
        assert!(!UnreadError::OutsideProvider.is_transient());
        assert!(!UnreadError::MissingCredential.is_transient());
    }
}
