//! Probe contract.
//!
//! A probe produces exactly one named [`Signal`] and never fails: whatever
//! goes wrong inside [`Probe::observe`] is replaced by the probe's
//! documented sentinel in [`Probe::run`]. The aggregator therefore needs no
//! per-probe error handling.

use async_trait::async_trait;
use futures::future::{select, Either};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::environment::Environment;
use crate::error::{FingerprintError, Result};

/// Closed set of signal names, in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalName {
    Metadata,
    PublicIp,
    IpReputation,
    DnsLeak,
    Incognito,
    Emulator,
    IpChange,
    Latency,
    Canvas,
    WebGl,
    Audio,
}

impl SignalName {
    /// Every signal, in catalog order
    pub const ALL: [SignalName; 11] = [
        SignalName::Metadata,
        SignalName::PublicIp,
        SignalName::IpReputation,
        SignalName::DnsLeak,
        SignalName::Incognito,
        SignalName::Emulator,
        SignalName::IpChange,
        SignalName::Latency,
        SignalName::Canvas,
        SignalName::WebGl,
        SignalName::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalName::Metadata => "metadata",
            SignalName::PublicIp => "publicIp",
            SignalName::IpReputation => "ipReputation",
            SignalName::DnsLeak => "dnsLeak",
            SignalName::Incognito => "incognito",
            SignalName::Emulator => "emulator",
            SignalName::IpChange => "ipChange",
            SignalName::Latency => "latency",
            SignalName::Canvas => "canvas",
            SignalName::WebGl => "webGL",
            SignalName::Audio => "audio",
        }
    }

    fn catalog_index(&self) -> usize {
        SignalName::ALL
            .iter()
            .position(|n| n == self)
            .unwrap_or(SignalName::ALL.len())
    }
}

impl fmt::Display for SignalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a signal value came about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    /// Real observation
    Ok,
    /// Sentinel: the capability or an upstream input was absent
    Fallback,
    /// Sentinel: the observation failed
    Error,
}

/// One probe's output. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal<T> {
    name: SignalName,
    value: T,
    status: SignalStatus,
}

impl<T> Signal<T> {
    pub fn new(name: SignalName, value: T, status: SignalStatus) -> Self {
        Self { name, value, status }
    }

    pub fn name(&self) -> SignalName {
        self.name
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn status(&self) -> SignalStatus {
        self.status
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Whether a probe can suspend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Reads environment state without suspending
    Pure,
    /// Suspends on network or driver round trips
    Effectful,
}

#[async_trait(?Send)]
pub trait Probe {
    type Output: 'static;

    fn name(&self) -> SignalName;

    fn kind(&self) -> ProbeKind {
        ProbeKind::Effectful
    }

    /// Take the actual observation. May fail.
    async fn observe(&self, env: &dyn Environment) -> Result<Self::Output>;

    /// Value substituted when `observe` fails with `err`
    fn sentinel(&self, err: &FingerprintError) -> Self::Output;

    /// Run the probe to completion. Never fails.
    ///
    /// Effectful probes are raced against `timeout` when one is given; an
    /// expired bound resolves to the sentinel like any other failure.
    async fn run(&self, env: &dyn Environment, timeout: Option<Duration>) -> Signal<Self::Output> {
        let outcome = match (self.kind(), timeout) {
            (ProbeKind::Effectful, Some(limit)) => {
                match select(self.observe(env), env.sleep(limit)).await {
                    Either::Left((outcome, _)) => outcome,
                    Either::Right(((), _)) => Err(FingerprintError::Timeout {
                        probe: self.name().as_str(),
                        after_ms: limit.as_millis() as u64,
                    }),
                }
            }
            _ => self.observe(env).await,
        };
        self.settle(outcome)
    }

    /// Turn an observation outcome into a signal.
    fn settle(&self, outcome: Result<Self::Output>) -> Signal<Self::Output> {
        match outcome {
            Ok(value) => Signal::new(self.name(), value, SignalStatus::Ok),
            Err(err) if err.is_unavailable() => {
                log::debug!("{} unavailable, using sentinel: {}", self.name(), err);
                Signal::new(self.name(), self.sentinel(&err), SignalStatus::Fallback)
            }
            Err(err) => {
                log::warn!("{} failed, using sentinel: {}", self.name(), err);
                Signal::new(self.name(), self.sentinel(&err), SignalStatus::Error)
            }
        }
    }
}

/// Per-run record of how each signal was obtained, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeReport {
    entries: Vec<(SignalName, SignalStatus)>,
}

impl ProbeReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a finished signal. Later notes for the same name replace earlier ones.
    pub fn record<T>(&mut self, signal: &Signal<T>) {
        self.set(signal.name(), signal.status());
    }

    fn set(&mut self, name: SignalName, status: SignalStatus) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = status,
            None => self.entries.push((name, status)),
        }
        self.entries.sort_by_key(|(n, _)| n.catalog_index());
    }

    pub fn status(&self, name: SignalName) -> Option<SignalStatus> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, s)| *s)
    }

    pub fn entries(&self) -> &[(SignalName, SignalStatus)] {
        &self.entries
    }

    /// Number of signals that fell back to a sentinel
    pub fn degraded(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, s)| *s != SignalStatus::Ok)
            .count()
    }
}
