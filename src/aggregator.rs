//! Aggregator: runs the signal catalog and builds the fingerprint record.
//!
//! ```text
//! metadata ─┐
//! public IP ┴─┬─ reputation(ip) ─┐
//!             ├─ ipChange(ip)    │
//!             ├─ dnsLeak         ├─ classify ─ FingerprintRecord
//!             ├─ incognito       │
//!             └─ audio           │
//! emulator, canvas, webGL ───────┘
//! ```
//!
//! The public IP is captured once and reused by both the reputation lookup
//! and the IP-change check. Every other effectful probe is independent, so
//! they run concurrently on the single-threaded executor. Results land in
//! fixed record slots, so completion order never affects the record.

use crate::catalog::{
    AudioProbe, CanvasProbe, DnsLeakProbe, EmulatorProbe, IncognitoProbe, IpChangeProbe,
    MetadataProbe, PublicIpProbe, ReputationProbe, WebGlProbe,
};
use crate::config::FingerprintConfig;
use crate::environment::Environment;
use crate::probe::{Probe, ProbeReport};
use crate::record::FingerprintRecord;
use crate::reputation::{classify, Classification, ReputationPayload, UNKNOWN};

/// Everything one aggregation pass produced
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub record: FingerprintRecord,
    pub public_ip: Option<String>,
    pub reputation: Option<ReputationPayload>,
    pub classification: Classification,
    pub report: ProbeReport,
}

pub struct Aggregator<'a> {
    env: &'a dyn Environment,
    config: &'a FingerprintConfig,
}

impl<'a> Aggregator<'a> {
    pub fn new(env: &'a dyn Environment, config: &'a FingerprintConfig) -> Self {
        Self { env, config }
    }

    /// Run every catalog probe except latency and assemble the record.
    pub async fn collect(&self) -> Aggregation {
        let env = self.env;
        let timeout = self.config.probe_timeout();
        let mut report = ProbeReport::new();

        let metadata = MetadataProbe.run(env, None).await;
        report.record(&metadata);
        let metadata = metadata.into_value();

        let public_ip = PublicIpProbe { url: &self.config.public_ip_url }
            .run(env, timeout)
            .await;
        report.record(&public_ip);
        let public_ip = public_ip.into_value();
        let ip = public_ip.as_deref();

        let reputation = ReputationProbe {
            ip,
            query_url: ip.map(|ip| self.config.reputation_query(ip)),
        };
        let dns_leak = DnsLeakProbe {
            origin: env.page_origin(),
            config: self.config,
        };
        let ip_change = IpChangeProbe {
            url: &self.config.public_ip_url,
            initial_ip: ip,
        };

        let (reputation, dns_leak, incognito, ip_changed, audio) = futures::join!(
            reputation.run(env, timeout),
            dns_leak.run(env, timeout),
            IncognitoProbe.run(env, timeout),
            ip_change.run(env, timeout),
            AudioProbe.run(env, timeout),
        );

        let emulator = EmulatorProbe { user_agent: &metadata.user_agent }
            .run(env, None)
            .await;
        let canvas = CanvasProbe.run(env, None).await;
        let webgl = WebGlProbe.run(env, None).await;

        report.record(&reputation);
        report.record(&dns_leak);
        report.record(&incognito);
        report.record(&emulator);
        report.record(&ip_changed);
        report.record(&canvas);
        report.record(&webgl);
        report.record(&audio);

        let reputation = reputation.into_value();
        let classification = classify(reputation.as_ref(), ip);
        if let Some(risk) = classification.risk {
            log::debug!("reputation risk score: {}", risk);
        }

        let record = FingerprintRecord {
            metadata,
            ip_address: public_ip.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            is_vpn: classification.is_vpn,
            is_incognito: incognito.into_value(),
            is_emulator: emulator.into_value(),
            ip_changed: ip_changed.into_value(),
            dns_leak: dns_leak.into_value(),
            canvas_fingerprint: canvas.into_value(),
            webgl_fingerprint: webgl.into_value(),
            audio_fingerprint: audio.into_value(),
        };

        log::info!(
            "Collected {} signals ({} degraded)",
            report.entries().len(),
            report.degraded()
        );

        Aggregation {
            record,
            public_ip,
            reputation,
            classification,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CANVAS_CONTEXT_ERROR, AUDIO_FINGERPRINT_ERROR, WEBGL_UNAVAILABLE};
    use crate::probe::{SignalName, SignalStatus};
    use crate::test_utils::{desktop_metadata, MockEnvironment};
    use futures::executor::block_on;
    use serde_json::json;

    fn config() -> FingerprintConfig {
        FingerprintConfig {
            public_ip_url: "https://ip.test/".into(),
            reputation_url: "https://rep.test/v2".into(),
            dns_resolver_url: "https://dns.test/q".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_everything_degraded() {
        let env = MockEnvironment::new();
        let config = config();
        let agg = block_on(Aggregator::new(&env, &config).collect());

        assert_eq!(agg.record.ip_address, UNKNOWN);
        assert_eq!(agg.record.metadata.user_agent, UNKNOWN);
        assert!(!agg.record.is_vpn);
        assert!(!agg.record.is_incognito);
        assert!(!agg.record.is_emulator);
        assert!(!agg.record.ip_changed);
        assert!(!agg.record.dns_leak);
        assert_eq!(agg.record.canvas_fingerprint, CANVAS_CONTEXT_ERROR);
        assert_eq!(agg.record.webgl_fingerprint, WEBGL_UNAVAILABLE);
        assert_eq!(agg.record.audio_fingerprint, AUDIO_FINGERPRINT_ERROR);
        assert!(agg.reputation.is_none());
        assert!(agg.classification.geo_location.is_unknown());

        // Everything but latency ran and fell back
        assert_eq!(agg.report.entries().len(), SignalName::ALL.len() - 1);
        assert_eq!(agg.report.status(SignalName::Latency), None);
        assert_eq!(agg.report.status(SignalName::Emulator), Some(SignalStatus::Ok));
        assert_eq!(agg.report.status(SignalName::IpChange), Some(SignalStatus::Ok));
    }

    #[test]
    fn test_public_ip_captured_once_for_reputation() {
        let env = MockEnvironment::new()
            .with_metadata(desktop_metadata())
            .with_json("https://ip.test/", json!({ "ip": "1.2.3.4" }))
            .with_json("https://ip.test/", json!({ "ip": "5.6.7.8" }))
            .with_json(
                "https://rep.test/v2/1.2.3.4?vpn=1&asn=1&threat=1&risk=1",
                json!({ "status": "ok", "1.2.3.4": { "proxy": "yes", "tor": "0" } }),
            );
        let config = config();
        let agg = block_on(Aggregator::new(&env, &config).collect());

        assert_eq!(agg.public_ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(agg.record.ip_address, "1.2.3.4");
        assert!(agg.record.is_vpn);
        assert!(agg.record.ip_changed);

        let ip_lookups = env
            .requests()
            .iter()
            .filter(|(url, _)| url == "https://ip.test/")
            .count();
        assert_eq!(ip_lookups, 2);
    }

    #[test]
    fn test_stalled_probe_does_not_block_others() {
        let env = MockEnvironment::new()
            .with_metadata(desktop_metadata())
            .with_page("https://shop.example.com/cart", "https://shop.example.com")
            .with_json("https://ip.test/", json!({ "ip": "1.2.3.4" }))
            .with_stalled("https://rep.test/v2/1.2.3.4?vpn=1&asn=1&threat=1&risk=1")
            .with_json(
                "https://dns.test/q?name=shop.example.com&type=A",
                json!({ "Answer": [{ "data": "192.168.1.1" }] }),
            )
            .with_storage(Ok(false))
            .with_canvas(Ok("data:image/png;base64,AAAA".into()));
        let config = config();
        let agg = block_on(Aggregator::new(&env, &config).collect());

        assert!(agg.reputation.is_none());
        assert_eq!(
            agg.report.status(SignalName::IpReputation),
            Some(SignalStatus::Error)
        );
        assert!(agg.record.dns_leak);
        assert!(agg.record.is_incognito);
        assert!(!agg.record.ip_changed);
        assert_eq!(agg.record.canvas_fingerprint, "data:image/png;base64,AAAA");
    }
}
