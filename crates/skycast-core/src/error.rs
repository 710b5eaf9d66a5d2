//! Centralized error types for the Skycast application.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// All errors in the Skycast application should be convertible to this type.
/// Use `user_message()` to get a display-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Service-level errors (weather, location, sync) mapped from domain crates.
    #[error("Service error: {0}")]
    Service(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    ///
    /// These messages are designed to be actionable and non-technical.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Storage(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Service(_) => "Something went wrong. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("TLS/SSL error: {0}")]
    TlsError(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => "Received an unexpected response. Please try again.",
            NetworkError::TlsError(_) => "Secure connection failed. Check your network settings.",
        }
    }
}

/// Local storage errors (SQLite, asset files).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::ConnectionFailed(_) => {
                "Unable to access local data. Try restarting the app."
            }
            StorageError::QueryFailed(_) => "A data operation failed. Please try again.",
            StorageError::Corruption(_) => {
                "Local data may be corrupted. Consider resetting app data."
            }
            StorageError::Serialization(_) => "Stored data could not be read. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_storage_error(self) -> StorageError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_storage_error(self) -> StorageError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                StorageError::Corruption(self.to_string())
            }
            _ => StorageError::QueryFailed(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_conversion() {
        let net_err = NetworkError::Timeout;
        let app_err: AppError = net_err.into();
        assert!(matches!(app_err, AppError::Network(NetworkError::Timeout)));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Network(NetworkError::Timeout);
        assert_eq!(
            app_err.user_message(),
            "The request timed out. Please try again."
        );
    }

    #[test]
    fn test_server_error_distinguishes_5xx() {
        let err = NetworkError::ServerError {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(err.user_message().contains("server"));

        let err = NetworkError::ServerError {
            status: 404,
            message: "missing".into(),
        };
        assert_eq!(err.user_message(), "The request failed. Please try again.");
    }

    #[test]
    fn test_rusqlite_corruption_detection() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(11), // SQLITE_CORRUPT
            Some("database disk image is malformed: corrupt".to_string()),
        );
        assert!(matches!(
            err.into_storage_error(),
            StorageError::Corruption(_)
        ));
    }
}
