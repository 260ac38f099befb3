//! Test utilities: a scriptable in-memory [`Environment`].
//!
//! Unscripted URLs fail with a network error and unscripted capabilities
//! report themselves unavailable, so a bare `MockEnvironment::new()` is a
//! host where every probe degrades to its sentinel.

use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::environment::{Environment, EnvironmentMetadata};
use crate::error::{FingerprintError, Result};

#[derive(Debug, Clone)]
enum Scripted {
    Json(serde_json::Value),
    Fail(FingerprintError),
    Stall,
}

pub struct MockEnvironment {
    metadata: Result<EnvironmentMetadata>,
    page_url: Option<String>,
    page_origin: Option<String>,
    json: RefCell<HashMap<String, VecDeque<Scripted>>>,
    statuses: HashMap<String, u16>,
    storage: Result<bool>,
    canvas: Result<String>,
    webgl: Result<String>,
    audio: Result<String>,
    requests: RefCell<Vec<(String, Option<String>)>>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        let unavailable = |what: &str| FingerprintError::CapabilityUnavailable(what.to_string());
        Self {
            metadata: Err(unavailable("navigator")),
            page_url: None,
            page_origin: None,
            json: RefCell::new(HashMap::new()),
            statuses: HashMap::new(),
            storage: Err(unavailable("RequestFileSystem")),
            canvas: Err(unavailable("2d context")),
            webgl: Err(unavailable("webgl context")),
            audio: Err(unavailable("OfflineAudioContext")),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_metadata(mut self, metadata: EnvironmentMetadata) -> Self {
        self.metadata = Ok(metadata);
        self
    }

    pub fn with_page(mut self, url: &str, origin: &str) -> Self {
        self.page_url = Some(url.to_string());
        self.page_origin = Some(origin.to_string());
        self
    }

    /// Answer `url` with `body`. Repeated calls queue answers; the last
    /// one keeps answering.
    pub fn with_json(self, url: &str, body: serde_json::Value) -> Self {
        self.script(url, Scripted::Json(body))
    }

    pub fn with_fetch_error(self, url: &str, err: FingerprintError) -> Self {
        self.script(url, Scripted::Fail(err))
    }

    /// Never answer `url`
    pub fn with_stalled(self, url: &str) -> Self {
        self.script(url, Scripted::Stall)
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn with_storage(mut self, granted: Result<bool>) -> Self {
        self.storage = granted;
        self
    }

    pub fn with_canvas(mut self, canvas: Result<String>) -> Self {
        self.canvas = canvas;
        self
    }

    pub fn with_webgl(mut self, webgl: Result<String>) -> Self {
        self.webgl = webgl;
        self
    }

    pub fn with_audio(mut self, audio: Result<String>) -> Self {
        self.audio = audio;
        self
    }

    /// JSON requests issued so far, with their `Accept` header
    pub fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.borrow().clone()
    }

    fn script(self, url: &str, answer: Scripted) -> Self {
        self.json
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(answer);
        self
    }

    fn next_answer(&self, url: &str) -> Option<Scripted> {
        let mut json = self.json.borrow_mut();
        let queue = json.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait(?Send)]
impl Environment for MockEnvironment {
    fn metadata(&self) -> Result<EnvironmentMetadata> {
        self.metadata.clone()
    }

    fn page_url(&self) -> Option<String> {
        self.page_url.clone()
    }

    fn page_origin(&self) -> Option<String> {
        self.page_origin.clone()
    }

    async fn fetch_json(&self, url: &str, accept: Option<&str>) -> Result<serde_json::Value> {
        self.requests
            .borrow_mut()
            .push((url.to_string(), accept.map(str::to_string)));
        match self.next_answer(url) {
            Some(Scripted::Json(body)) => Ok(body),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Stall) => futures::future::pending().await,
            None => Err(FingerprintError::Network(format!("no route to {}", url))),
        }
    }

    async fn fetch_status(&self, url: &str) -> Result<u16> {
        self.statuses
            .get(url)
            .copied()
            .ok_or_else(|| FingerprintError::Network(format!("no route to {}", url)))
    }

    async fn temporary_storage_granted(&self) -> Result<bool> {
        self.storage.clone()
    }

    fn render_canvas(&self) -> Result<String> {
        self.canvas.clone()
    }

    fn render_webgl(&self) -> Result<String> {
        self.webgl.clone()
    }

    async fn render_audio(&self) -> Result<String> {
        self.audio.clone()
    }

    async fn sleep(&self, _duration: Duration) {}
}

/// Metadata of a typical desktop browser
pub fn desktop_metadata() -> EnvironmentMetadata {
    EnvironmentMetadata {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0"
            .to_string(),
        language: Some("en-US".to_string()),
        languages: vec!["en-US".to_string(), "en".to_string()],
        platform: "Linux x86_64".to_string(),
        screen_width: Some(1920),
        screen_height: Some(1080),
        timezone: Some("Europe/Berlin".to_string()),
        hardware_concurrency: Some(8),
        device_memory: Some(8.0),
        color_depth: Some(24),
        device_pixel_ratio: Some(1.0),
    }
}
