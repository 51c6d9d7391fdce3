// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the OTLP receiver.
//!
//! This module provides strongly-typed errors for the request path, the
//! listener lifecycle and configuration loading, using `thiserror` for
//! ergonomic error definitions and `anyhow` for error propagation in the binary.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors that can occur while handling a single ingestion request.
///
/// None of these escape the request boundary: each one renders as an
/// HTTP error response with an `{"error": "..."}` body.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to decompress gzip body: {0}")]
    Decompress(String),

    #[error("Request body exceeds limit of {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Unsupported content type: {0} (only OTLP/HTTP JSON is accepted)")]
    UnsupportedContentType(String),

    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Decompress(_) | Self::InvalidJson(_) | Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedEncoding(_) | Self::UnsupportedContentType(_) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidJson(err.to_string())
    }
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Errors that can occur while starting or running the listener.
#[derive(Error, Debug)]
pub enum ReceiverError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReceiverError {
    /// Check if this is a bind failure caused by the port being taken.
    pub fn is_addr_in_use(&self) -> bool {
        matches!(
            self,
            Self::Bind { source, .. } if source.kind() == std::io::ErrorKind::AddrInUse
        )
    }
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl ConfigError {
    /// Create an invalid-value error for a named field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_status_codes() {
        assert_eq!(
            IngestError::Decompress("bad header".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IngestError::InvalidJson("eof".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IngestError::BodyTooLarge { limit: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            IngestError::UnsupportedEncoding("br".to_string()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            IngestError::Internal("join".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_ingest_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: IngestError = result.unwrap_err().into();
        assert!(matches!(err, IngestError::InvalidJson(_)));
    }

    #[test]
    fn test_receiver_error_addr_in_use() {
        let addr: SocketAddr = "127.0.0.1:4318".parse().unwrap();
        let err = ReceiverError::Bind {
            addr,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken"),
        };
        assert!(err.is_addr_in_use());

        let err = ReceiverError::Bind {
            addr,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.is_addr_in_use());
    }

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let config_err: ConfigError = result.unwrap_err().into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_error_display() {
        let err = IngestError::BodyTooLarge { limit: 10_485_760 };
        let display = format!("{}", err);
        assert!(display.contains("10485760"));
    }
}
