//! Error types for Paperstack
//!
//! Provides a single error enum for every outbound collaborator with:
//! - Distinct variants for transient and permanent failures
//! - Machine-readable error codes for structured logs
//! - The transient classification consumed by the retry policy

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    InvalidFormat,
    MalformedRecord,

    // Resource errors (4xxx)
    NotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamTimeout,
    ServiceUnavailable,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidFormat => 1001,
            ErrorCode::MalformedRecord => 1002,
            ErrorCode::NotFound => 4001,
            ErrorCode::RateLimited => 6001,
            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamTimeout => 8002,
            ErrorCode::ServiceUnavailable => 8003,
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Malformed record from {service}: {message}")]
    MalformedRecord { service: String, message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Transient external failures
    #[error("Rate limited by {service}")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    #[error("Request to {service} timed out")]
    Timeout { service: String },

    #[error("Service unavailable: {service} returned {status}")]
    ServiceUnavailable { service: String, status: u16 },

    // Permanent external failures
    #[error("Upstream error from {service}: {message}")]
    Upstream { service: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::MalformedRecord { .. } => ErrorCode::MalformedRecord,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Timeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::HttpClient(e) if e.is_timeout() => ErrorCode::UpstreamTimeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether a retry has a reasonable chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::RateLimited { .. }
            | AppError::Timeout { .. }
            | AppError::ServiceUnavailable { .. } => true,
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Configuration errors abort the run before any external call
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Configuration { .. })
    }

    /// Classify a non-success HTTP status from `service`
    pub fn from_status(service: &str, status: u16, body: String) -> Self {
        match status {
            429 => AppError::RateLimited {
                service: service.to_string(),
                retry_after: None,
            },
            408 | 500..=599 => AppError::ServiceUnavailable {
                service: service.to_string(),
                status,
            },
            404 => AppError::NotFound {
                resource_type: service.to_string(),
                id: body,
            },
            _ => AppError::Upstream {
                service: service.to_string(),
                message: format!("API error {}: {}", status, body),
            },
        }
    }

    /// Map a transport failure, keeping timeouts distinguishable
    pub fn from_transport(service: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Timeout {
                service: service.to_string(),
            }
        } else {
            AppError::HttpClient(err)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
