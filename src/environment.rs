//! Host capability interface.
//!
//! The pipeline never touches `window`, `navigator` or `document` directly.
//! Everything it observes comes through an [`Environment`]: metadata reads,
//! JSON fetches, the temporary-storage request and the three opaque
//! "render and sample" primitives. [`crate::browser::BrowserEnvironment`]
//! is the web-sys implementation; tests script their own.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Raw environment metadata as reported by the host.
///
/// Optional fields are `None` when the host does not expose them. No
/// normalization happens here; see [`crate::catalog::MetadataProbe`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentMetadata {
    pub user_agent: String,
    pub language: Option<String>,
    pub languages: Vec<String>,
    pub platform: String,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub timezone: Option<String>,
    pub hardware_concurrency: Option<u32>,
    pub device_memory: Option<f64>,
    pub color_depth: Option<u32>,
    pub device_pixel_ratio: Option<f64>,
}

/// Capabilities a fingerprinting run needs from its host.
///
/// Implementations report failures as errors; turning them into sentinels
/// is the probes' job.
#[async_trait(?Send)]
pub trait Environment {
    /// Synchronous metadata read
    fn metadata(&self) -> Result<EnvironmentMetadata>;

    /// Full URL of the current page
    fn page_url(&self) -> Option<String>;

    /// Origin of the current page (`scheme://host[:port]`)
    fn page_origin(&self) -> Option<String>;

    /// GET `url` and parse the body as JSON.
    ///
    /// A non-2xx response must be reported as
    /// [`FingerprintError::HttpStatus`](crate::FingerprintError::HttpStatus).
    async fn fetch_json(&self, url: &str, accept: Option<&str>) -> Result<serde_json::Value>;

    /// Issue an uncached GET to `url` and return the HTTP status.
    async fn fetch_status(&self, url: &str) -> Result<u16>;

    /// Request a small temporary file system. `Ok(true)` when granted.
    async fn temporary_storage_granted(&self) -> Result<bool>;

    /// Draw the reference 2d scene and return its data URL
    fn render_canvas(&self) -> Result<String>;

    /// Return `"{renderer}-{vendor}"` of the WebGL implementation
    fn render_webgl(&self) -> Result<String>;

    /// Render the reference offline audio graph and return the sample digest
    async fn render_audio(&self) -> Result<String>;

    /// Resolve after `duration`. Only used to bound probes.
    async fn sleep(&self, duration: Duration);
}
