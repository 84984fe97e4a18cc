//! Application error types

use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Timeout or connection failure talking to the provider
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Quota exhausted or provider blocked the request (429/403)
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// Response did not carry the expected fields
    #[error("Unexpected response shape: {0}")]
    DataShape(String),

    /// A single forecast predictor failed to train or predict
    #[error("Model error: {0}")]
    Model(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the fetch client should try the call again
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::TransientNetwork(_) | AppError::RateLimited(_) => true,
            AppError::Http(e) => !e.is_decode(),
            _ => false,
        }
    }

    /// Whether the provider pool should move to its next endpoint
    pub fn triggers_failover(&self) -> bool {
        matches!(self, AppError::RateLimited(_))
    }

    /// Short machine-readable code, used in logs and event payloads
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::DuckDb(_) => "DUCKDB_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Http(_) => "HTTP_ERROR",
            AppError::TransientNetwork(_) => "TRANSIENT_NETWORK_ERROR",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::DataShape(_) => "DATA_SHAPE_ERROR",
            AppError::Model(_) => "MODEL_ERROR",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Serializable error summary attached to broadcast events
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        ErrorResponse {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(AppError::TransientNetwork("timeout".into()).is_retryable());
        assert!(AppError::RateLimited("429".into()).is_retryable());
        assert!(!AppError::NotFound("404".into()).is_retryable());
        assert!(!AppError::DataShape("missing prices".into()).is_retryable());
        assert!(!AppError::Model("singular".into()).is_retryable());
    }

    #[test]
    fn test_failover_only_on_rate_limit() {
        assert!(AppError::RateLimited("403".into()).triggers_failover());
        assert!(!AppError::TransientNetwork("reset".into()).triggers_failover());
    }

    #[test]
    fn test_error_response_code() {
        let err = AppError::Persistence("disk full".into());
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "PERSISTENCE_ERROR");
        assert!(response.message.contains("disk full"));
    }
}
