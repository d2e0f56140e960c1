//! Error types and handling for Boreas
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Boreas operations
pub type Result<T> = std::result::Result<T, BoreasError>;

/// Main error type for Boreas
#[derive(Debug, Error)]
pub enum BoreasError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Network/transport errors while talking to a remote API
    #[error("Network error: {message}")]
    Network { message: String },

    /// Remote API answered but not with what we expected
    #[error("API error: {message}")]
    Api { message: String },

    /// Response body could not be decoded (JSON or line format)
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl BoreasError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        BoreasError::Config {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        BoreasError::Network {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        BoreasError::Api {
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        BoreasError::Decode {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        BoreasError::Io {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        BoreasError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        BoreasError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for BoreasError {
    fn from(err: std::io::Error) -> Self {
        BoreasError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for BoreasError {
    fn from(err: serde_yaml::Error) -> Self {
        BoreasError::decode(err.to_string())
    }
}

impl From<serde_json::Error> for BoreasError {
    fn from(err: serde_json::Error) -> Self {
        BoreasError::decode(err.to_string())
    }
}

impl From<reqwest::Error> for BoreasError {
    fn from(err: reqwest::Error) -> Self {
        BoreasError::network(err.to_string())
    }
}

impl From<chrono::ParseError> for BoreasError {
    fn from(err: chrono::ParseError) -> Self {
        BoreasError::validation("datetime", &err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BoreasError::config("test config error");
        assert!(matches!(err, BoreasError::Config { .. }));

        let err = BoreasError::network("test network error");
        assert!(matches!(err, BoreasError::Network { .. }));

        let err = BoreasError::validation("field", "test validation error");
        assert!(matches!(err, BoreasError::Validation { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = BoreasError::config("test error");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Configuration error: test error");

        let err = BoreasError::validation("test_field", "invalid value");
        let error_string = format!("{}", err);
        assert_eq!(error_string, "Validation error: test_field - invalid value");
    }
}
