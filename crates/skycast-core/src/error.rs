//! Centralized error types for Skycast.
//!
//! This module provides a typed error hierarchy that:
//! - Keeps network faults as plain data so they can travel inside screen state
//! - Provides user-friendly messages for screen errors
//! - Preserves full error context for logging

use thiserror::Error;

/// Transport-level faults: the request never produced a usable response.
///
/// `Clone` so a fault can be carried inside published screen state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
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
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
            NetworkError::TlsError(_) => "Secure connection failed. Check your network settings.",
        }
    }
}

/// Local persistence errors (SQLite, preference and task files).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Store IO failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StoreError::ConnectionFailed(_) => {
                "Unable to access local data. Try restarting the app."
            }
            StoreError::QueryFailed(_) => "A data operation failed. Please try again.",
            StoreError::Corruption(_) => {
                "Local data may be corrupted. Consider resetting app data."
            }
            StoreError::Serialization(_) => "Failed to save settings. Please try again.",
            StoreError::Io(_) => "A file operation failed. Please try again.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    NoConfigDir,

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
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
    fn into_store_error(self) -> StoreError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_store_error(self) -> StoreError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                StoreError::Corruption(self.to_string())
            }
            rusqlite::Error::SqliteFailure(_, _) => StoreError::ConnectionFailed(self.to_string()),
            _ => StoreError::QueryFailed(self.to_string()),
        }
    }
}
