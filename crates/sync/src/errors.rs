//! Sync run error types

use paperstack_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Client setup failed for {service}: {message}")]
    ClientSetup { service: String, message: String },

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl SyncError {
    /// Wrap a client construction failure, keeping configuration errors fatal
    pub fn client(service: &str, err: AppError) -> Self {
        if err.is_fatal() {
            return SyncError::Configuration(err.to_string());
        }
        SyncError::ClientSetup {
            service: service.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<AppError> for SyncError {
    fn from(e: AppError) -> Self {
        if e.is_fatal() {
            SyncError::Configuration(e.to_string())
        } else {
            SyncError::Upstream(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_stay_fatal() {
        let err = SyncError::from(AppError::Configuration {
            message: "notion.token is required".to_string(),
        });
        assert!(matches!(err, SyncError::Configuration(_)));

        let err = SyncError::client(
            "openai",
            AppError::Configuration {
                message: "llm.api_key is required".to_string(),
            },
        );
        assert!(matches!(err, SyncError::Configuration(_)));
    }

    #[test]
    fn test_client_setup_error() {
        let err = SyncError::client(
            "arxiv",
            AppError::Internal {
                message: "tls backend unavailable".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "Client setup failed for arxiv: Internal error: tls backend unavailable"
        );
    }
}
