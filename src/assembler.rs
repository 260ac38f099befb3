//! Final result assembly.

use serde::{Deserialize, Serialize};

use crate::aggregator::Aggregation;
use crate::reputation::GeoLocation;

/// The externally visible fingerprint. Owned by the caller; nothing here
/// retains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintResult {
    pub fingerprint_hash: String,
    pub ip_address: String,
    pub geo_location: GeoLocation,
    #[serde(rename = "isVPN")]
    pub is_vpn: bool,
    pub is_tor: bool,
    pub is_emulator: bool,
    pub is_incognito: bool,
    /// Milliseconds, or infinity when the endpoint did not answer OK
    pub latency: f64,
    pub ip_changed: bool,
    pub dns_leak: bool,
    pub canvas_fingerprint: String,
    #[serde(rename = "webGLFingerprint")]
    pub webgl_fingerprint: String,
    pub audio_fingerprint: String,
}

/// Merge the aggregation, its hash and the latency measurement.
pub fn assemble(aggregation: Aggregation, fingerprint_hash: String, latency: f64) -> FingerprintResult {
    let Aggregation {
        record,
        classification,
        ..
    } = aggregation;

    FingerprintResult {
        fingerprint_hash,
        ip_address: record.ip_address,
        geo_location: classification.geo_location,
        is_vpn: classification.is_vpn,
        is_tor: classification.is_tor,
        is_emulator: record.is_emulator,
        is_incognito: record.is_incognito,
        latency,
        ip_changed: record.ip_changed,
        dns_leak: record.dns_leak,
        canvas_fingerprint: record.canvas_fingerprint,
        webgl_fingerprint: record.webgl_fingerprint,
        audio_fingerprint: record.audio_fingerprint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeReport;
    use crate::record::{BrowserMetadata, FingerprintRecord};
    use crate::reputation::Classification;

    #[test]
    fn test_assemble_and_field_names() {
        let aggregation = Aggregation {
            record: FingerprintRecord {
                metadata: BrowserMetadata::unknown(),
                ip_address: "unknown".into(),
                is_vpn: true,
                is_incognito: true,
                is_emulator: false,
                ip_changed: false,
                dns_leak: true,
                canvas_fingerprint: "canvas_context_error".into(),
                webgl_fingerprint: "webgl_unavailable".into(),
                audio_fingerprint: "audio_rendering_error".into(),
            },
            public_ip: None,
            reputation: None,
            classification: Classification {
                is_vpn: true,
                is_tor: true,
                geo_location: GeoLocation::unknown(),
                risk: Some(80),
            },
            report: ProbeReport::new(),
        };

        let result = assemble(aggregation, "ab".repeat(32), 12.5);
        assert!(result.is_vpn);
        assert!(result.is_tor);
        assert!(result.is_incognito);
        assert!(result.dns_leak);
        assert_eq!(result.latency, 12.5);

        let value = serde_json::to_value(&result).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "fingerprintHash",
            "ipAddress",
            "geoLocation",
            "isVPN",
            "isTor",
            "isEmulator",
            "isIncognito",
            "latency",
            "ipChanged",
            "dnsLeak",
            "canvasFingerprint",
            "webGLFingerprint",
            "audioFingerprint",
        ] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert_eq!(obj.len(), 13);
        assert_eq!(value["geoLocation"]["latitude"], "unknown");
    }
}
