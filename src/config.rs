//! Fingerprint configuration.
//!
//! Everything the pipeline needs from the outside world besides the
//! [`Environment`](crate::Environment) lives here: service endpoints, the
//! reputation API key, the trusted resolver list and the probe time bound.
//! The JS caller may pass a partial object; missing fields take defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FingerprintError, Result};

pub const DEFAULT_PUBLIC_IP_URL: &str = "https://api64.ipify.org?format=json";
pub const DEFAULT_REPUTATION_URL: &str = "https://proxycheck.io/v2";
pub const DEFAULT_DNS_RESOLVER_URL: &str = "https://cloudflare-dns.com/dns-query";
pub const DEFAULT_KNOWN_RESOLVERS: &[&str] = &["8.8.8.8", "1.1.1.1", "9.9.9.9", "208.67.222.222"];
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Configuration injected into the [`Fingerprinter`](crate::Fingerprinter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FingerprintConfig {
    /// IP-reputation API key. Omitted from the query when absent.
    pub api_key: Option<String>,
    /// Public-IP lookup answering `{ "ip": "..." }`
    pub public_ip_url: String,
    /// IP-reputation base URL; the IP is appended as a path segment
    pub reputation_url: String,
    /// DNS-over-HTTPS resolver answering `application/dns-json`
    pub dns_resolver_url: String,
    /// Resolver addresses that do not count as a leak
    pub known_resolvers: Vec<String>,
    /// Upper bound per network probe. `None` waits indefinitely.
    pub probe_timeout_ms: Option<u64>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            public_ip_url: DEFAULT_PUBLIC_IP_URL.to_string(),
            reputation_url: DEFAULT_REPUTATION_URL.to_string(),
            dns_resolver_url: DEFAULT_DNS_RESOLVER_URL.to_string(),
            known_resolvers: DEFAULT_KNOWN_RESOLVERS.iter().map(|s| s.to_string()).collect(),
            probe_timeout_ms: Some(DEFAULT_PROBE_TIMEOUT_MS),
        }
    }
}

impl FingerprintConfig {
    /// Create config with a reputation API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Per-probe time bound, if any
    pub fn probe_timeout(&self) -> Option<Duration> {
        self.probe_timeout_ms.map(Duration::from_millis)
    }

    /// Build the reputation lookup URL for `ip`, requesting VPN, ASN,
    /// threat and risk detail.
    pub fn reputation_query(&self, ip: &str) -> String {
        let base = self.reputation_url.trim_end_matches('/');
        match &self.api_key {
            Some(key) => format!("{}/{}?key={}&vpn=1&asn=1&threat=1&risk=1", base, ip, key),
            None => format!("{}/{}?vpn=1&asn=1&threat=1&risk=1", base, ip),
        }
    }

    /// Build the DNS-over-HTTPS A-record query URL for `host`
    pub fn dns_query(&self, host: &str) -> String {
        format!("{}?name={}&type=A", self.dns_resolver_url, host)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (field, url) in [
            ("publicIpUrl", &self.public_ip_url),
            ("reputationUrl", &self.reputation_url),
            ("dnsResolverUrl", &self.dns_resolver_url),
        ] {
            let parsed = parse_url(url)?;
            if !parsed.has_scheme {
                return Err(FingerprintError::InvalidConfig(format!(
                    "{} must be an http(s) URL: {}",
                    field, url
                )));
            }
        }

        if self.known_resolvers.is_empty() {
            return Err(FingerprintError::InvalidConfig(
                "knownResolvers must not be empty".into(),
            ));
        }

        if self.probe_timeout_ms == Some(0) {
            return Err(FingerprintError::InvalidConfig(
                "probeTimeoutMs must be positive".into(),
            ));
        }

        Ok(())
    }
}

/// Host part of a URL or bare origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub host: String,
    /// Whether an `http://` or `https://` scheme was present
    pub has_scheme: bool,
}

/// Parse a URL or bare origin, validating any explicit port.
pub fn parse_url(url: &str) -> Result<ParsedUrl> {
    let url = url.trim();

    // Detect scheme
    let (without_scheme, has_scheme) = match url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
    {
        Some(rest) => (rest, true),
        None => (url, false),
    };

    // Drop path, query and fragment
    let host_port = match without_scheme.find(|c| c == '/' || c == '?' || c == '#') {
        Some(pos) => &without_scheme[..pos],
        None => without_scheme,
    };

    let host = match host_port.rfind(':') {
        Some(colon_pos) => {
            let port_str = &host_port[colon_pos + 1..];
            port_str
                .parse::<u16>()
                .map_err(|_| FingerprintError::InvalidUrl(format!("invalid port: {}", port_str)))?;
            &host_port[..colon_pos]
        }
        None => host_port,
    };

    if host.is_empty() {
        return Err(FingerprintError::InvalidUrl(format!("missing host: {}", url)));
    }

    Ok(ParsedUrl {
        host: host.to_string(),
        has_scheme,
    })
}
