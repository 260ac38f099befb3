//! # Device Fingerprint
//!
//! Browser device fingerprinting compiled to WebAssembly.
//!
//! Collects environment signals (browser metadata, network reputation,
//! rendering digests), reduces them to a canonical record and hashes it
//! into a stable fingerprint identifier.
//!
//! ## Architecture
//!
//! ```text
//! generateDeviceFingerprint (JS)
//!   ↓
//! Fingerprinter
//!   ↓
//! Aggregator ── Probe catalog
//!   ↓               ↓
//! Hasher        Environment (browser / test double)
//!   ↓
//! FingerprintResult
//! ```
//!
//! ## Features
//!
//! - **Graceful degradation**: every signal has a fallback value, one failing
//!   probe never aborts the run
//! - **Deterministic**: identical signals always hash to the same identifier
//! - **Testable**: all browser access goes through the [`Environment`] trait

use wasm_bindgen::prelude::*;

// Modules
mod error;
pub mod config;
pub mod environment;
pub mod probe;
pub mod catalog;
pub mod record;
pub mod reputation;
pub mod aggregator;
pub mod hasher;
pub mod assembler;
pub mod fingerprinter;
pub mod browser;

#[cfg(test)]
mod test_utils;

pub use error::{ErrorCode, ErrorInfo, FingerprintError, Result};
pub use config::{parse_url, FingerprintConfig, ParsedUrl};
pub use environment::{Environment, EnvironmentMetadata};
pub use probe::{Probe, ProbeKind, ProbeReport, Signal, SignalName, SignalStatus};
pub use record::{BrowserMetadata, FingerprintRecord, Reading, RECORD_KEYS};
pub use reputation::{classify, Classification, GeoLocation, ReputationPayload, UNKNOWN};
pub use aggregator::{Aggregation, Aggregator};
pub use hasher::content_hash;
pub use assembler::{assemble, FingerprintResult};
pub use fingerprinter::Fingerprinter;
pub use browser::BrowserEnvironment;

/// Initialize the fingerprint module
///
/// This sets up logging.
#[wasm_bindgen(start)]
pub fn init() {
    // A host page may have installed its own logger already
    let _ = console_log::init_with_level(log::Level::Info);

    log::info!("Device fingerprint module initialized");
}

/// Generate a device fingerprint for the current page.
///
/// `endpoint` is the latency target (defaults to the page URL). `options`
/// is an optional [`FingerprintConfig`] object, e.g. `{ apiKey: "..." }`.
/// Rejects only when no result can be produced at all.
#[wasm_bindgen(js_name = generateDeviceFingerprint)]
pub async fn generate_device_fingerprint(
    endpoint: Option<String>,
    options: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    let config = if options.is_undefined() || options.is_null() {
        FingerprintConfig::default()
    } else {
        serde_wasm_bindgen::from_value(options)
            .map_err(|e| FingerprintError::InvalidConfig(format!("options: {}", e)))?
    };

    let env = BrowserEnvironment::new()?;
    let fingerprinter = Fingerprinter::new(env, config)?;
    let result = fingerprinter.generate(endpoint.as_deref()).await?;

    // Default serializer keeps `latency: Infinity` as a JS number
    serde_wasm_bindgen::to_value(&result)
        .map_err(|e| FingerprintError::Serialization(e.to_string()).into())
}
