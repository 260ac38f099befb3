//! Browser [`Environment`] backed by web-sys.
//!
//! Each primitive reports failure as a [`FingerprintError`]; a missing API
//! is `CapabilityUnavailable`, a throwing one `RenderFailed`, a rejected
//! asynchronous render `RenderRejected`.

use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect};
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AudioBuffer, CanvasRenderingContext2d, HtmlCanvasElement, OfflineAudioContext, OscillatorType,
    Request, RequestCache, RequestInit, RequestMode, Response, WebGlRenderingContext, Window,
};

use crate::environment::{Environment, EnvironmentMetadata};
use crate::error::{FingerprintError, Result};

// WEBGL_debug_renderer_info
const UNMASKED_VENDOR_WEBGL: u32 = 0x9245;
const UNMASKED_RENDERER_WEBGL: u32 = 0x9246;

const AUDIO_SAMPLE_RATE: f32 = 44_100.0;
const AUDIO_FRAMES: u32 = 44_100;
const AUDIO_DIGEST_SAMPLES: usize = 100;

/// Size requested from the temporary file system
const TEMPORARY_FS_BYTES: f64 = 100.0;

fn describe(err: &JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

fn render_failed(err: JsValue) -> FingerprintError {
    FingerprintError::RenderFailed(describe(&err))
}

/// Plain text form of a JS value, as `String(value)` renders it
fn js_text(value: &JsValue) -> String {
    if let Some(s) = value.as_string() {
        return s;
    }
    if value.is_null() {
        return "null".to_string();
    }
    if value.is_undefined() {
        return "undefined".to_string();
    }
    if let Some(n) = value.as_f64() {
        return js_sys::Number::from(n)
            .to_string(10)
            .map(String::from)
            .unwrap_or_else(|_| n.to_string());
    }
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .unwrap_or_default()
}

/// Read a numeric property, treating `undefined`/non-numbers as absent.
fn number_property(obj: &JsValue, name: &str) -> Option<f64> {
    Reflect::get(obj, &JsValue::from_str(name))
        .ok()
        .and_then(|v| v.as_f64())
}

/// [`Environment`] over the current browsing context
pub struct BrowserEnvironment {
    window: Window,
}

impl BrowserEnvironment {
    pub fn new() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| FingerprintError::CapabilityUnavailable("no window object".into()))?;
        Ok(Self { window })
    }

    fn create_canvas(&self) -> Result<HtmlCanvasElement> {
        let document = self
            .window
            .document()
            .ok_or_else(|| FingerprintError::CapabilityUnavailable("no document".into()))?;
        document
            .create_element("canvas")
            .map_err(render_failed)?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| FingerprintError::RenderFailed("element is not a canvas".into()))
    }

    /// `Intl.DateTimeFormat().resolvedOptions().timeZone`
    fn timezone() -> Option<String> {
        let intl = Reflect::get(&js_sys::global(), &JsValue::from_str("Intl")).ok()?;
        let ctor: Function = Reflect::get(&intl, &JsValue::from_str("DateTimeFormat"))
            .ok()?
            .dyn_into()
            .ok()?;
        let format = Reflect::construct(&ctor, &Array::new()).ok()?;
        let resolved: Function = Reflect::get(&format, &JsValue::from_str("resolvedOptions"))
            .ok()?
            .dyn_into()
            .ok()?;
        let options = resolved.call0(&format).ok()?;
        Reflect::get(&options, &JsValue::from_str("timeZone"))
            .ok()
            .and_then(|tz| tz.as_string())
    }

    async fn send(&self, url: &str, opts: &RequestInit, accept: Option<&str>) -> Result<Response> {
        let request = Request::new_with_str_and_init(url, opts)
            .map_err(|e| FingerprintError::Network(format!("Request::new failed: {}", describe(&e))))?;

        if let Some(accept) = accept {
            request
                .headers()
                .set("Accept", accept)
                .map_err(|e| FingerprintError::Network(format!("set header failed: {}", describe(&e))))?;
        }

        let resp_value = JsFuture::from(self.window.fetch_with_request(&request))
            .await
            .map_err(|e| FingerprintError::Network(format!("fetch failed: {}", describe(&e))))?;

        resp_value
            .dyn_into::<Response>()
            .map_err(|_| FingerprintError::Network("response is not a Response".into()))
    }
}

#[async_trait(?Send)]
impl Environment for BrowserEnvironment {
    fn metadata(&self) -> Result<EnvironmentMetadata> {
        let navigator = self.window.navigator();
        let user_agent = navigator
            .user_agent()
            .map_err(|e| FingerprintError::CapabilityUnavailable(describe(&e)))?;
        let platform = navigator
            .platform()
            .map_err(|e| FingerprintError::CapabilityUnavailable(describe(&e)))?;
        let languages = navigator
            .languages()
            .iter()
            .filter_map(|l| l.as_string())
            .collect();

        let screen = self.window.screen().ok();
        let screen_dim = |read: fn(&web_sys::Screen) -> std::result::Result<i32, JsValue>| {
            screen
                .as_ref()
                .and_then(|s| read(s).ok())
                .and_then(|v| u32::try_from(v).ok())
        };

        let navigator_value: &JsValue = navigator.as_ref();
        let window_value: &JsValue = self.window.as_ref();

        Ok(EnvironmentMetadata {
            user_agent,
            language: navigator.language(),
            languages,
            platform,
            screen_width: screen_dim(web_sys::Screen::width),
            screen_height: screen_dim(web_sys::Screen::height),
            timezone: Self::timezone(),
            hardware_concurrency: number_property(navigator_value, "hardwareConcurrency")
                .map(|n| n as u32),
            device_memory: number_property(navigator_value, "deviceMemory"),
            color_depth: screen_dim(web_sys::Screen::color_depth),
            device_pixel_ratio: number_property(window_value, "devicePixelRatio"),
        })
    }

    fn page_url(&self) -> Option<String> {
        self.window.location().href().ok()
    }

    fn page_origin(&self) -> Option<String> {
        self.window.location().origin().ok()
    }

    async fn fetch_json(&self, url: &str, accept: Option<&str>) -> Result<serde_json::Value> {
        let opts = RequestInit::new();
        opts.set_method("GET");
        opts.set_mode(RequestMode::Cors);

        let resp = self.send(url, &opts, accept).await?;
        if !resp.ok() {
            return Err(FingerprintError::HttpStatus(resp.status()));
        }

        // Parse from text so numbers keep their wire representation
        let text = JsFuture::from(
            resp.text()
                .map_err(|e| FingerprintError::Parse(format!("text failed: {}", describe(&e))))?,
        )
        .await
        .map_err(|e| FingerprintError::Parse(format!("await text failed: {}", describe(&e))))?;

        let text = text
            .as_string()
            .ok_or_else(|| FingerprintError::Parse("body is not text".into()))?;
        serde_json::from_str(&text).map_err(|e| FingerprintError::Parse(e.to_string()))
    }

    async fn fetch_status(&self, url: &str) -> Result<u16> {
        let opts = RequestInit::new();
        opts.set_method("GET");
        opts.set_cache(RequestCache::NoCache);

        let resp = self.send(url, &opts, None).await?;
        Ok(resp.status())
    }

    async fn temporary_storage_granted(&self) -> Result<bool> {
        let window_value: &JsValue = self.window.as_ref();
        let request_fs: Function = ["RequestFileSystem", "webkitRequestFileSystem"]
            .iter()
            .filter_map(|name| Reflect::get(window_value, &JsValue::from_str(name)).ok())
            .find(|f| f.is_function())
            .ok_or_else(|| {
                FingerprintError::CapabilityUnavailable("RequestFileSystem not supported".into())
            })?
            .unchecked_into();
        let temporary = Reflect::get(window_value, &JsValue::from_str("TEMPORARY"))
            .ok()
            .filter(|t| !t.is_undefined())
            .unwrap_or_else(|| JsValue::from_f64(0.0));

        let this = window_value.clone();
        let promise = Promise::new(&mut |resolve: Function, reject: Function| {
            let on_granted = resolve.clone();
            let granted = Closure::once_into_js(move |_fs: JsValue| {
                let _ = on_granted.call1(&JsValue::NULL, &JsValue::TRUE);
            });
            let denied = Closure::once_into_js(move |_err: JsValue| {
                let _ = resolve.call1(&JsValue::NULL, &JsValue::FALSE);
            });

            let args = Array::of4(
                &temporary,
                &JsValue::from_f64(TEMPORARY_FS_BYTES),
                &granted,
                &denied,
            );
            if let Err(e) = Reflect::apply(&request_fs, &this, &args) {
                let _ = reject.call1(&JsValue::NULL, &e);
            }
        });

        let granted = JsFuture::from(promise)
            .await
            .map_err(|e| FingerprintError::RenderFailed(format!("RequestFileSystem threw: {}", describe(&e))))?;
        Ok(granted.as_bool().unwrap_or(false))
    }

    fn render_canvas(&self) -> Result<String> {
        let canvas = self.create_canvas()?;
        let ctx = canvas
            .get_context("2d")
            .map_err(render_failed)?
            .ok_or_else(|| FingerprintError::CapabilityUnavailable("no 2d context".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| FingerprintError::CapabilityUnavailable("not a 2d context".into()))?;

        ctx.set_text_baseline("top");
        ctx.set_font("14px Arial");
        ctx.set_fill_style_str("#f60");
        ctx.fill_rect(125.0, 1.0, 62.0, 20.0);
        ctx.set_fill_style_str("#069");
        ctx.fill_text("Fingerprinting Test", 2.0, 15.0)
            .map_err(render_failed)?;

        canvas.to_data_url().map_err(render_failed)
    }

    fn render_webgl(&self) -> Result<String> {
        let canvas = self.create_canvas()?;
        let gl = ["webgl", "experimental-webgl"]
            .iter()
            .find_map(|kind| canvas.get_context(kind).ok().flatten())
            .ok_or_else(|| FingerprintError::CapabilityUnavailable("no webgl context".into()))?
            .dyn_into::<WebGlRenderingContext>()
            .map_err(|_| FingerprintError::CapabilityUnavailable("not a webgl context".into()))?;

        let parameter = |pname: u32| -> Result<String> {
            let value = gl.get_parameter(pname).map_err(render_failed)?;
            Ok(js_text(&value))
        };

        let debug_info = gl
            .get_extension("WEBGL_debug_renderer_info")
            .map_err(render_failed)?;
        let (renderer, vendor) = match debug_info {
            Some(_) => (
                parameter(UNMASKED_RENDERER_WEBGL)?,
                parameter(UNMASKED_VENDOR_WEBGL)?,
            ),
            None => ("unknown_renderer".to_string(), "unknown_vendor".to_string()),
        };

        Ok(format!("{}-{}", renderer, vendor))
    }

    async fn render_audio(&self) -> Result<String> {
        let window_value: &JsValue = self.window.as_ref();
        if !Reflect::has(window_value, &JsValue::from_str("OfflineAudioContext")).unwrap_or(false) {
            return Err(FingerprintError::CapabilityUnavailable(
                "OfflineAudioContext not supported".into(),
            ));
        }

        let ctx = OfflineAudioContext::new_with_number_of_channels_and_length_and_sample_rate(
            1,
            AUDIO_FRAMES,
            AUDIO_SAMPLE_RATE,
        )
        .map_err(render_failed)?;

        let oscillator = ctx.create_oscillator().map_err(render_failed)?;
        let compressor = ctx.create_dynamics_compressor().map_err(render_failed)?;

        oscillator.set_type(OscillatorType::Triangle);
        oscillator
            .frequency()
            .set_value_at_time(1000.0, ctx.current_time())
            .map_err(render_failed)?;
        oscillator
            .connect_with_audio_node(&compressor)
            .map_err(render_failed)?;
        compressor
            .connect_with_audio_node(&ctx.destination())
            .map_err(render_failed)?;
        oscillator.start_with_when(0.0).map_err(render_failed)?;
        oscillator.stop_with_when(0.1).map_err(render_failed)?;

        let rendered = JsFuture::from(ctx.start_rendering().map_err(render_failed)?)
            .await
            .map_err(|e| FingerprintError::RenderRejected(describe(&e)))?;
        let buffer: AudioBuffer = rendered
            .dyn_into()
            .map_err(|_| FingerprintError::RenderRejected("result is not an AudioBuffer".into()))?;

        let samples = buffer.get_channel_data(0).map_err(render_failed)?;
        let digest: f64 = samples
            .iter()
            .take(AUDIO_DIGEST_SAMPLES)
            .map(|s| f64::from(*s).abs())
            .sum();

        Ok(digest.to_string())
    }

    async fn sleep(&self, duration: Duration) {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        gloo_timers::future::TimeoutFuture::new(millis).await;
    }
}
