//! # Client Error Types
//!
//! Error handling for calls against the point history and ledger services.

use thiserror::Error;

/// Client operation result type
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Timeout waiting for operation: {operation}")]
    Timeout { operation: String },

    #[error("Connection pool exhausted: {pending} requests already waiting")]
    PoolExhausted { pending: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Create an API error from HTTP response
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid response error for a body that does not match the contract
    pub fn invalid_response(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// True when the remote service never produced an answer. Gateway statuses
    /// (502, 503, 504) count: they come from a proxy, not from the service.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            ClientError::HttpError(e) => !e.is_status(),
            ClientError::Timeout { .. } | ClientError::PoolExhausted { .. } => true,
            ClientError::ApiError { status, .. } => is_gateway_status(*status),
            ClientError::InvalidResponse { .. }
            | ClientError::ConfigError(_)
            | ClientError::Internal(_) => false,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            ClientError::HttpError(e) => e.is_timeout(),
            ClientError::Timeout { .. } => true,
            _ => false,
        }
    }
}

fn is_gateway_status(status: u16) -> bool {
    matches!(status, 502..=504)
}
