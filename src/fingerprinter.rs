//! Public entry point: aggregate, hash, time, assemble.

use crate::aggregator::Aggregator;
use crate::assembler::{assemble, FingerprintResult};
use crate::catalog::LatencyProbe;
use crate::config::FingerprintConfig;
use crate::environment::Environment;
use crate::error::Result;
use crate::hasher::content_hash;
use crate::probe::{Probe, ProbeReport};

/// Generates device fingerprints against one environment.
pub struct Fingerprinter<E: Environment> {
    env: E,
    config: FingerprintConfig,
}

impl<E: Environment> Fingerprinter<E> {
    pub fn new(env: E, config: FingerprintConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { env, config })
    }

    /// Produce one fingerprint.
    ///
    /// `endpoint` is the latency target; the current page URL is used when
    /// it is `None`. Only aggregation-fatal errors are returned.
    pub async fn generate(&self, endpoint: Option<&str>) -> Result<FingerprintResult> {
        self.generate_with_report(endpoint).await.map(|(result, _)| result)
    }

    /// Like [`generate`](Self::generate), also returning how each signal
    /// was obtained.
    pub async fn generate_with_report(
        &self,
        endpoint: Option<&str>,
    ) -> Result<(FingerprintResult, ProbeReport)> {
        log::info!("Generating device fingerprint");

        let mut aggregation = Aggregator::new(&self.env, &self.config).collect().await;
        let fingerprint_hash = content_hash(&aggregation.record)?;

        // Latency varies run to run; it is measured only once the hash is fixed.
        let page_url = self.env.page_url();
        let latency = LatencyProbe {
            endpoint: endpoint.or(page_url.as_deref()),
        }
        .run(&self.env, self.config.probe_timeout())
        .await;
        aggregation.report.record(&latency);

        let report = aggregation.report.clone();
        let result = assemble(aggregation, fingerprint_hash, latency.into_value());

        log::info!(
            "✅ Fingerprint {}… ({} of {} signals degraded)",
            &result.fingerprint_hash[..12],
            report.degraded(),
            report.entries().len()
        );
        if log::log_enabled!(log::Level::Debug) {
            if let Ok(json) = serde_json::to_string(&result) {
                log::debug!("Fingerprint result: {}", json);
            }
        }

        Ok((result, report))
    }
}
