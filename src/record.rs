//! Fixed-schema fingerprint record.
//!
//! The record is what gets hashed. Its key set is closed and identical for
//! every run: a failed probe contributes its sentinel, never a missing key.
//! Field declaration order is the canonical key order.

use serde::{Serialize, Serializer};

use crate::reputation::UNKNOWN;

/// A numeric reading the host may not expose.
///
/// Serializes as the number itself, or as `"unknown"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<T> {
    Known(T),
    Unknown,
}

impl<T> From<Option<T>> for Reading<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Reading::Known(v),
            None => Reading::Unknown,
        }
    }
}

impl<T: Serialize> Serialize for Reading<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Known(v) => v.serialize(serializer),
            Reading::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

/// Normalized environment metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserMetadata {
    pub user_agent: String,
    pub language: String,
    pub languages: String,
    pub platform: String,
    pub screen_resolution: String,
    pub timezone: String,
    pub hardware_concurrency: Reading<u32>,
    pub device_memory: Reading<f64>,
    pub color_depth: Reading<u32>,
    pub device_pixel_ratio: Reading<f64>,
}

impl BrowserMetadata {
    /// Metadata for a host that could not be read at all
    pub fn unknown() -> Self {
        Self {
            user_agent: UNKNOWN.to_string(),
            language: UNKNOWN.to_string(),
            languages: UNKNOWN.to_string(),
            platform: UNKNOWN.to_string(),
            screen_resolution: UNKNOWN.to_string(),
            timezone: UNKNOWN.to_string(),
            hardware_concurrency: Reading::Unknown,
            device_memory: Reading::Unknown,
            color_depth: Reading::Unknown,
            device_pixel_ratio: Reading::Unknown,
        }
    }
}

/// Everything that feeds the content hash.
///
/// Latency is absent: it varies run to run and is attached to
/// the result only after hashing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintRecord {
    #[serde(flatten)]
    pub metadata: BrowserMetadata,
    pub ip_address: String,
    #[serde(rename = "isVPN")]
    pub is_vpn: bool,
    pub is_incognito: bool,
    pub is_emulator: bool,
    pub ip_changed: bool,
    pub dns_leak: bool,
    pub canvas_fingerprint: String,
    #[serde(rename = "webGLFingerprint")]
    pub webgl_fingerprint: String,
    pub audio_fingerprint: String,
}

/// Keys of a serialized [`FingerprintRecord`], in canonical order
pub const RECORD_KEYS: [&str; 19] = [
    "userAgent",
    "language",
    "languages",
    "platform",
    "screenResolution",
    "timezone",
    "hardwareConcurrency",
    "deviceMemory",
    "colorDepth",
    "devicePixelRatio",
    "ipAddress",
    "isVPN",
    "isIncognito",
    "isEmulator",
    "ipChanged",
    "dnsLeak",
    "canvasFingerprint",
    "webGLFingerprint",
    "audioFingerprint",
];
