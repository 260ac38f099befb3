//! Scripted host shared by the integration tests.

use async_trait::async_trait;
use device_fingerprint::{Environment, EnvironmentMetadata, FingerprintConfig, FingerprintError, Result};
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashMap;
use std::time::Duration;

pub const IP_URL: &str = "https://ip.test/";
pub const REPUTATION_URL: &str = "https://reputation.test/v2";
pub const DNS_URL: &str = "https://dns.test/dns-query";
pub const PAGE_URL: &str = "https://shop.example.com/checkout";
pub const PAGE_ORIGIN: &str = "https://shop.example.com";

pub fn config() -> FingerprintConfig {
    FingerprintConfig {
        api_key: Some("test-key".into()),
        public_ip_url: IP_URL.into(),
        reputation_url: REPUTATION_URL.into(),
        dns_resolver_url: DNS_URL.into(),
        ..Default::default()
    }
}

pub fn reputation_url(ip: &str) -> String {
    format!("{}/{}?key=test-key&vpn=1&asn=1&threat=1&risk=1", REPUTATION_URL, ip)
}

pub fn dns_url() -> String {
    format!("{}?name=shop.example.com&type=A", DNS_URL)
}

/// A host whose every capability is either scripted or missing.
///
/// Public-IP answers are consumed in order (the last one repeats); other
/// URLs always give the same answer.
#[derive(Default)]
pub struct ScriptedHost {
    pub metadata: Option<EnvironmentMetadata>,
    pub page: bool,
    pub public_ips: Vec<&'static str>,
    pub json: HashMap<String, Value>,
    pub stalled: Vec<String>,
    pub statuses: HashMap<String, u16>,
    pub storage: Option<bool>,
    pub canvas: Option<Result<String>>,
    pub webgl: Option<Result<String>>,
    pub audio: Option<Result<String>>,
    ip_calls: Cell<usize>,
}

impl ScriptedHost {
    /// A fully working host on a desktop browser
    pub fn healthy() -> Self {
        let mut json = HashMap::new();
        json.insert(
            reputation_url("203.0.113.7"),
            serde_json::json!({
                "status": "ok",
                "203.0.113.7": {
                    "proxy": "no",
                    "type": "Business",
                    "country": "Germany",
                    "region": "Berlin",
                    "city": "Berlin",
                    "latitude": 52.52,
                    "longitude": 13.405,
                    "risk": 0
                }
            }),
        );
        json.insert(dns_url(), serde_json::json!({ "Answer": [{ "data": "8.8.8.8" }] }));

        Self {
            metadata: Some(desktop()),
            page: true,
            public_ips: vec!["203.0.113.7"],
            json,
            statuses: HashMap::from([(PAGE_URL.to_string(), 200)]),
            storage: Some(true),
            canvas: Some(Ok("data:image/png;base64,iVBORw0KGgo".into())),
            webgl: Some(Ok("ANGLE (Intel)-Google Inc.".into())),
            audio: Some(Ok("35.73833402246237".into())),
            ..Default::default()
        }
    }
}

fn unavailable(what: &str) -> FingerprintError {
    FingerprintError::CapabilityUnavailable(what.to_string())
}

pub fn desktop() -> EnvironmentMetadata {
    EnvironmentMetadata {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0 Safari/537.36"
            .into(),
        language: Some("de-DE".into()),
        languages: vec!["de-DE".into(), "en".into()],
        platform: "Win32".into(),
        screen_width: Some(2560),
        screen_height: Some(1440),
        timezone: Some("Europe/Berlin".into()),
        hardware_concurrency: Some(16),
        device_memory: Some(8.0),
        color_depth: Some(24),
        device_pixel_ratio: Some(1.5),
    }
}

#[async_trait(?Send)]
impl Environment for ScriptedHost {
    fn metadata(&self) -> Result<EnvironmentMetadata> {
        self.metadata.clone().ok_or_else(|| unavailable("navigator"))
    }

    fn page_url(&self) -> Option<String> {
        self.page.then(|| PAGE_URL.to_string())
    }

    fn page_origin(&self) -> Option<String> {
        self.page.then(|| PAGE_ORIGIN.to_string())
    }

    async fn fetch_json(&self, url: &str, _accept: Option<&str>) -> Result<Value> {
        if self.stalled.iter().any(|s| s == url) {
            return futures::future::pending().await;
        }
        if url == IP_URL && !self.public_ips.is_empty() {
            let call = self.ip_calls.get();
            self.ip_calls.set(call + 1);
            let ip = self.public_ips[call.min(self.public_ips.len() - 1)];
            return Ok(serde_json::json!({ "ip": ip }));
        }
        self.json
            .get(url)
            .cloned()
            .ok_or_else(|| FingerprintError::Network(format!("unreachable: {}", url)))
    }

    async fn fetch_status(&self, url: &str) -> Result<u16> {
        self.statuses
            .get(url)
            .copied()
            .ok_or_else(|| FingerprintError::Network(format!("unreachable: {}", url)))
    }

    async fn temporary_storage_granted(&self) -> Result<bool> {
        self.storage.ok_or_else(|| unavailable("RequestFileSystem"))
    }

    fn render_canvas(&self) -> Result<String> {
        self.canvas.clone().unwrap_or_else(|| Err(unavailable("2d context")))
    }

    fn render_webgl(&self) -> Result<String> {
        self.webgl.clone().unwrap_or_else(|| Err(unavailable("webgl context")))
    }

    async fn render_audio(&self) -> Result<String> {
        self.audio.clone().unwrap_or_else(|| Err(unavailable("OfflineAudioContext")))
    }

    async fn sleep(&self, _duration: Duration) {}
}
