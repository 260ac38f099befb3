//! Error types for the fingerprinting pipeline
//!
//! This module provides the error taxonomy with:
//! - Detailed error variants for transport, payload and capability failures
//! - Classification (probe-local vs aggregation-fatal)
//! - User-friendly messages
//! - Error codes for programmatic handling
//!
//! Probe-local errors never reach the caller: every probe converts them to
//! its sentinel. Only aggregation-fatal errors propagate out of
//! [`crate::Fingerprinter::generate`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasm_bindgen::JsValue;

pub type Result<T> = std::result::Result<T, FingerprintError>;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Transport errors (1xx)
    NetworkFailed = 100,
    HttpStatus = 101,
    ProbeTimeout = 102,

    // Payload errors (2xx)
    MalformedPayload = 200,

    // Capability errors (3xx)
    CapabilityUnavailable = 300,
    RenderRejected = 301,
    RenderFailed = 302,

    // Configuration errors (8xx)
    ConfigError = 800,
    InvalidUrl = 801,

    // Internal errors (9xx)
    SerializationFailed = 900,
}

/// Main error type for the fingerprinting pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FingerprintError {
    // ===== Transport Errors =====
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Probe '{probe}' timed out after {after_ms}ms")]
    Timeout { probe: &'static str, after_ms: u64 },

    // ===== Payload Errors =====
    #[error("Parse error: {0}")]
    Parse(String),

    // ===== Capability Errors =====
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("Rendering rejected: {0}")]
    RenderRejected(String),

    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    // ===== Configuration Errors =====
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // ===== Internal Errors =====
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FingerprintError {
    /// Get the error code for programmatic handling
    pub fn code(&self) -> ErrorCode {
        match self {
            FingerprintError::Network(_) => ErrorCode::NetworkFailed,
            FingerprintError::HttpStatus(_) => ErrorCode::HttpStatus,
            FingerprintError::Timeout { .. } => ErrorCode::ProbeTimeout,

            FingerprintError::Parse(_) => ErrorCode::MalformedPayload,

            FingerprintError::CapabilityUnavailable(_) => ErrorCode::CapabilityUnavailable,
            FingerprintError::RenderRejected(_) => ErrorCode::RenderRejected,
            FingerprintError::RenderFailed(_) => ErrorCode::RenderFailed,

            FingerprintError::InvalidConfig(_) => ErrorCode::ConfigError,
            FingerprintError::InvalidUrl(_) => ErrorCode::InvalidUrl,

            FingerprintError::Serialization(_) => ErrorCode::SerializationFailed,
        }
    }

    /// Whether a probe recovers from this error by substituting its sentinel.
    pub fn is_probe_local(&self) -> bool {
        matches!(
            self,
            FingerprintError::Network(_)
                | FingerprintError::HttpStatus(_)
                | FingerprintError::Timeout { .. }
                | FingerprintError::Parse(_)
                | FingerprintError::CapabilityUnavailable(_)
                | FingerprintError::RenderRejected(_)
                | FingerprintError::RenderFailed(_)
        )
    }

    /// Whether this error aborts the whole fingerprinting run.
    ///
    /// These only arise outside any probe boundary and indicate a broken
    /// invariant rather than a hostile or degraded environment.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FingerprintError::Serialization(_))
    }

    /// Whether the signal is missing because the host lacks the API,
    /// as opposed to the API failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FingerprintError::CapabilityUnavailable(_))
    }

    /// Get a user-friendly message for display
    pub fn user_message(&self) -> String {
        match self {
            FingerprintError::Network(_) => {
                "A network request failed. Please check your internet connection.".into()
            }
            FingerprintError::HttpStatus(status) => {
                format!("A lookup service answered with HTTP {}.", status)
            }
            FingerprintError::Timeout { probe, .. } => {
                format!("The {} check took too long and was skipped.", probe)
            }
            FingerprintError::Parse(_) => "A lookup service returned unexpected data.".into(),
            FingerprintError::CapabilityUnavailable(_) => {
                "This browser does not support a required feature.".into()
            }
            FingerprintError::RenderRejected(_) | FingerprintError::RenderFailed(_) => {
                "A rendering check could not complete.".into()
            }
            FingerprintError::InvalidConfig(_) => {
                "Invalid fingerprint configuration. Please check your options.".into()
            }
            FingerprintError::InvalidUrl(_) => {
                "Invalid URL provided. Please check the URL format.".into()
            }
            FingerprintError::Serialization(_) => {
                "An internal error occurred. Please report this bug.".into()
            }
        }
    }
}

impl From<serde_json::Error> for FingerprintError {
    fn from(err: serde_json::Error) -> Self {
        FingerprintError::Serialization(err.to_string())
    }
}

impl From<FingerprintError> for JsValue {
    fn from(err: FingerprintError) -> Self {
        let info = ErrorInfo::from(&err);
        serde_wasm_bindgen::to_value(&info).unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
    }
}

/// Error information for JavaScript consumption
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: u32,
    pub message: String,
    pub user_message: String,
    pub is_fatal: bool,
}

impl From<&FingerprintError> for ErrorInfo {
    fn from(err: &FingerprintError) -> Self {
        ErrorInfo {
            code: err.code() as u32,
            message: err.to_string(),
            user_message: err.user_message(),
            is_fatal: err.is_fatal(),
        }
    }
}
