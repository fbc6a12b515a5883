//! Error types and handling for Surplus Manager
//!
//! This module defines the error types used throughout the crate, providing
//! consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Surplus Manager operations
pub type Result<T> = std::result::Result<T, ManagerError>;

/// Main error type for Surplus Manager
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Configuration-related errors (blocking, require reconfiguration)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors for a single field
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// An item value that cannot be used for its role
    #[error("Invalid value for {item}: {message}")]
    InvalidValue { item: String, message: String },

    /// Output sink errors
    #[error("Output error: {message}")]
    Output { message: String },

    /// Task/runtime errors
    #[error("Runtime error: {message}")]
    Runtime { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl ManagerError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ManagerError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ManagerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid value error
    pub fn invalid_value<S: Into<String>>(item: S, message: S) -> Self {
        ManagerError::InvalidValue {
            item: item.into(),
            message: message.into(),
        }
    }

    /// Create a new output error
    pub fn output<S: Into<String>>(message: S) -> Self {
        ManagerError::Output {
            message: message.into(),
        }
    }

    /// Create a new runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        ManagerError::Runtime {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ManagerError::Io {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ManagerError {
    fn from(err: std::io::Error) -> Self {
        ManagerError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ManagerError {
    fn from(err: serde_yaml::Error) -> Self {
        ManagerError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ManagerError {
    fn from(err: serde_json::Error) -> Self {
        ManagerError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for ManagerError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            ManagerError::runtime(format!("task panicked: {}", err))
        } else {
            ManagerError::runtime(format!("task cancelled: {}", err))
        }
    }
}
