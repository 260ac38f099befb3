//! Signal catalog: the concrete probes.
//!
//! Each probe owns the logic that turns a raw environment observation into
//! its signal value, and its sentinel table entry. Rendering and transport
//! internals stay behind [`Environment`].

use async_trait::async_trait;
use web_time::Instant;

use crate::config::{parse_url, FingerprintConfig};
use crate::environment::{Environment, EnvironmentMetadata};
use crate::error::{FingerprintError, Result};
use crate::probe::{Probe, ProbeKind, SignalName};
use crate::record::{BrowserMetadata, Reading};
use crate::reputation::{ReputationPayload, UNKNOWN};

pub const CANVAS_CONTEXT_ERROR: &str = "canvas_context_error";
pub const CANVAS_FINGERPRINT_ERROR: &str = "canvas_fingerprint_error";
pub const WEBGL_UNAVAILABLE: &str = "webgl_unavailable";
pub const WEBGL_FINGERPRINT_ERROR: &str = "webgl_fingerprint_error";
pub const AUDIO_RENDERING_ERROR: &str = "audio_rendering_error";
pub const AUDIO_FINGERPRINT_ERROR: &str = "audio_fingerprint_error";

/// User-agent fragments that mark emulators and automation
pub const EMULATOR_PATTERNS: &[&str] =
    &["emulator", "virtual", "sdk", "bot", "crawler", "spider", "phantom"];

const DNS_JSON: &str = "application/dns-json";

// ===== Metadata =====

/// Normalizes host metadata. Missing values become `"unknown"`; present
/// zeros stay zeros.
pub struct MetadataProbe;

impl MetadataProbe {
    pub fn normalize(raw: EnvironmentMetadata) -> BrowserMetadata {
        let screen_resolution = match (raw.screen_width, raw.screen_height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => UNKNOWN.to_string(),
        };
        let timezone = match raw.timezone {
            Some(tz) if !tz.is_empty() => tz,
            _ => UNKNOWN.to_string(),
        };

        BrowserMetadata {
            user_agent: raw.user_agent,
            language: raw.language.unwrap_or_else(|| UNKNOWN.to_string()),
            languages: raw.languages.join(","),
            platform: raw.platform,
            screen_resolution,
            timezone,
            hardware_concurrency: Reading::from(raw.hardware_concurrency),
            device_memory: Reading::from(raw.device_memory),
            color_depth: Reading::from(raw.color_depth),
            device_pixel_ratio: Reading::from(raw.device_pixel_ratio),
        }
    }
}

#[async_trait(?Send)]
impl Probe for MetadataProbe {
    type Output = BrowserMetadata;

    fn name(&self) -> SignalName {
        SignalName::Metadata
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Pure
    }

    async fn observe(&self, env: &dyn Environment) -> Result<BrowserMetadata> {
        env.metadata().map(Self::normalize)
    }

    fn sentinel(&self, _err: &FingerprintError) -> BrowserMetadata {
        BrowserMetadata::unknown()
    }
}

// ===== Public IP =====

pub struct PublicIpProbe<'a> {
    pub url: &'a str,
}

#[async_trait(?Send)]
impl Probe for PublicIpProbe<'_> {
    type Output = Option<String>;

    fn name(&self) -> SignalName {
        SignalName::PublicIp
    }

    async fn observe(&self, env: &dyn Environment) -> Result<Option<String>> {
        let body = env.fetch_json(self.url, None).await?;
        match body.get("ip").and_then(|ip| ip.as_str()) {
            Some(ip) if !ip.is_empty() => Ok(Some(ip.to_string())),
            _ => Err(FingerprintError::Parse("public IP response has no ip".into())),
        }
    }

    fn sentinel(&self, _err: &FingerprintError) -> Option<String> {
        None
    }
}

// ===== IP reputation =====

pub struct ReputationProbe<'a> {
    pub ip: Option<&'a str>,
    /// Lookup URL for `ip`, built by the caller from its configuration
    pub query_url: Option<String>,
}

#[async_trait(?Send)]
impl Probe for ReputationProbe<'_> {
    type Output = Option<ReputationPayload>;

    fn name(&self) -> SignalName {
        SignalName::IpReputation
    }

    async fn observe(&self, env: &dyn Environment) -> Result<Option<ReputationPayload>> {
        let (Some(ip), Some(url)) = (self.ip, self.query_url.as_deref()) else {
            return Err(FingerprintError::CapabilityUnavailable(
                "no public IP to look up".into(),
            ));
        };
        let body = env.fetch_json(url, None).await?;
        let payload = ReputationPayload::from_json(body)?;
        log::debug!(
            "reputation for {}: status={:?}, entries={}",
            ip,
            payload.status,
            payload.entries.len()
        );
        Ok(Some(payload))
    }

    fn sentinel(&self, _err: &FingerprintError) -> Option<ReputationPayload> {
        None
    }
}

// ===== DNS leak =====

pub struct DnsLeakProbe<'a> {
    /// Page origin whose A record is resolved
    pub origin: Option<String>,
    pub config: &'a FingerprintConfig,
}

impl DnsLeakProbe<'_> {
    /// A leak is an answer from anything other than a known public resolver.
    pub fn is_leak(&self, body: &serde_json::Value) -> bool {
        let first = body
            .get("Answer")
            .and_then(|a| a.as_array())
            .and_then(|a| a.first())
            .and_then(|a| a.get("data"))
            .and_then(|d| d.as_str());

        match first {
            Some(server) => !self.config.known_resolvers.iter().any(|known| known == server),
            None => false,
        }
    }
}

#[async_trait(?Send)]
impl Probe for DnsLeakProbe<'_> {
    type Output = bool;

    fn name(&self) -> SignalName {
        SignalName::DnsLeak
    }

    async fn observe(&self, env: &dyn Environment) -> Result<bool> {
        let origin = self.origin.as_deref().ok_or_else(|| {
            FingerprintError::CapabilityUnavailable("no page origin".into())
        })?;
        let host = parse_url(origin)?.host;
        let url = self.config.dns_query(&host);
        let body = env.fetch_json(&url, Some(DNS_JSON)).await?;
        Ok(self.is_leak(&body))
    }

    fn sentinel(&self, _err: &FingerprintError) -> bool {
        false
    }
}

// ===== Incognito =====

pub struct IncognitoProbe;

#[async_trait(?Send)]
impl Probe for IncognitoProbe {
    type Output = bool;

    fn name(&self) -> SignalName {
        SignalName::Incognito
    }

    async fn observe(&self, env: &dyn Environment) -> Result<bool> {
        // Private modes refuse the temporary file system
        Ok(!env.temporary_storage_granted().await?)
    }

    fn sentinel(&self, _err: &FingerprintError) -> bool {
        false
    }
}

// ===== Emulator =====

pub struct EmulatorProbe<'a> {
    pub user_agent: &'a str,
}

impl EmulatorProbe<'_> {
    pub fn matches(user_agent: &str) -> bool {
        let ua = user_agent.to_lowercase();
        EMULATOR_PATTERNS.iter().any(|p| ua.contains(p))
    }
}

#[async_trait(?Send)]
impl Probe for EmulatorProbe<'_> {
    type Output = bool;

    fn name(&self) -> SignalName {
        SignalName::Emulator
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Pure
    }

    async fn observe(&self, _env: &dyn Environment) -> Result<bool> {
        Ok(Self::matches(self.user_agent))
    }

    fn sentinel(&self, _err: &FingerprintError) -> bool {
        false
    }
}

// ===== IP change =====

/// Re-captures the public IP and compares it with the run's initial capture.
pub struct IpChangeProbe<'a> {
    pub url: &'a str,
    pub initial_ip: Option<&'a str>,
}

#[async_trait(?Send)]
impl Probe for IpChangeProbe<'_> {
    type Output = bool;

    fn name(&self) -> SignalName {
        SignalName::IpChange
    }

    async fn observe(&self, env: &dyn Environment) -> Result<bool> {
        let current = PublicIpProbe { url: self.url }.run(env, None).await.into_value();
        Ok(current.as_deref() != self.initial_ip)
    }

    fn sentinel(&self, _err: &FingerprintError) -> bool {
        false
    }
}

// ===== Latency =====

pub struct LatencyProbe<'a> {
    pub endpoint: Option<&'a str>,
}

#[async_trait(?Send)]
impl Probe for LatencyProbe<'_> {
    type Output = f64;

    fn name(&self) -> SignalName {
        SignalName::Latency
    }

    async fn observe(&self, env: &dyn Environment) -> Result<f64> {
        let endpoint = self.endpoint.ok_or_else(|| {
            FingerprintError::CapabilityUnavailable("no latency endpoint".into())
        })?;
        let start = Instant::now();
        let status = env.fetch_status(endpoint).await?;
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        if (200..300).contains(&status) {
            Ok(elapsed)
        } else {
            Err(FingerprintError::HttpStatus(status))
        }
    }

    fn sentinel(&self, _err: &FingerprintError) -> f64 {
        f64::INFINITY
    }
}

// ===== Rendering artifacts =====

pub struct CanvasProbe;

#[async_trait(?Send)]
impl Probe for CanvasProbe {
    type Output = String;

    fn name(&self) -> SignalName {
        SignalName::Canvas
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Pure
    }

    async fn observe(&self, env: &dyn Environment) -> Result<String> {
        env.render_canvas()
    }

    fn sentinel(&self, err: &FingerprintError) -> String {
        match err {
            FingerprintError::CapabilityUnavailable(_) => CANVAS_CONTEXT_ERROR,
            _ => CANVAS_FINGERPRINT_ERROR,
        }
        .to_string()
    }
}

pub struct WebGlProbe;

#[async_trait(?Send)]
impl Probe for WebGlProbe {
    type Output = String;

    fn name(&self) -> SignalName {
        SignalName::WebGl
    }

    fn kind(&self) -> ProbeKind {
        ProbeKind::Pure
    }

    async fn observe(&self, env: &dyn Environment) -> Result<String> {
        env.render_webgl()
    }

    fn sentinel(&self, err: &FingerprintError) -> String {
        match err {
            FingerprintError::CapabilityUnavailable(_) => WEBGL_UNAVAILABLE,
            _ => WEBGL_FINGERPRINT_ERROR,
        }
        .to_string()
    }
}

pub struct AudioProbe;

#[async_trait(?Send)]
impl Probe for AudioProbe {
    type Output = String;

    fn name(&self) -> SignalName {
        SignalName::Audio
    }

    async fn observe(&self, env: &dyn Environment) -> Result<String> {
        env.render_audio().await
    }

    fn sentinel(&self, err: &FingerprintError) -> String {
        match err {
            FingerprintError::RenderRejected(_) => AUDIO_RENDERING_ERROR,
            _ => AUDIO_FINGERPRINT_ERROR,
        }
        .to_string()
    }
}
