//! IP-reputation payload model and classifier.
//!
//! The reputation service answers with a flat JSON object: a `status`
//! string plus one key per queried IP, whose value is either an entry
//! object or a bare status string:
//!
//! ```json
//! { "status": "ok",
//!   "1.2.3.4": { "proxy": "yes", "tor": "0", "country": "US",
//!                "latitude": 37.75, "longitude": -97.82, "risk": 66 } }
//! ```
//!
//! Only the entry keyed by the locally observed public IP is relevant.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{FingerprintError, Result};

pub const UNKNOWN: &str = "unknown";

/// Parsed reputation response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReputationPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub entries: HashMap<String, ReputationRecord>,
}

/// Value stored under an IP key
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReputationRecord {
    Entry(ReputationEntry),
    Status(String),
    Other(serde_json::Value),
}

/// Per-IP reputation detail.
///
/// Every field is read on its own: a value of an unexpected type becomes
/// `None` instead of invalidating the whole entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReputationEntry {
    #[serde(default, deserialize_with = "lenient_text")]
    pub asn: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub provider: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub organisation: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub isocode: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub latitude: Option<Coordinate>,
    #[serde(default, deserialize_with = "lenient")]
    pub longitude: Option<Coordinate>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub proxy: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_risk")]
    pub risk: Option<u32>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub tor: Option<String>,
}

/// Any value `T` accepts, else `None`
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Strings as-is, numbers in their JSON text form (`"asn": 15169`)
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Risk score from an integer, a float or a numeric string
fn lenient_risk<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let score = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score
        .filter(|r| r.is_finite() && *r >= 0.0 && *r <= f64::from(u32::MAX))
        .map(|r| r.round() as u32))
}

/// Latitude or longitude, as the service sent it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Coordinate {
    Number(serde_json::Number),
    Text(String),
}

// Whole floats print without a fraction, like JS `Number#toString`
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Number(n) => match n.as_f64() {
                Some(v) if n.is_f64() && v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER => {
                    write!(f, "{}", v as i64)
                }
                _ => write!(f, "{}", n),
            },
            Coordinate::Text(s) => f.write_str(s),
        }
    }
}

impl ReputationPayload {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(FingerprintError::Parse(
                "reputation payload is not an object".into(),
            ));
        }
        serde_json::from_value(value).map_err(|e| FingerprintError::Parse(e.to_string()))
    }

    /// Entry object for `ip`. Bare status strings and other shapes yield `None`.
    pub fn entry(&self, ip: &str) -> Option<&ReputationEntry> {
        match self.entries.get(ip) {
            Some(ReputationRecord::Entry(entry)) => Some(entry),
            _ => None,
        }
    }
}

/// Geolocation derived from a reputation entry. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: String,
    pub longitude: String,
}

impl GeoLocation {
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            latitude: UNKNOWN.to_string(),
            longitude: UNKNOWN.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }
}

/// Classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub is_vpn: bool,
    pub is_tor: bool,
    pub geo_location: GeoLocation,
    pub risk: Option<u32>,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            is_vpn: false,
            is_tor: false,
            geo_location: GeoLocation::unknown(),
            risk: None,
        }
    }
}

/// Classify the observed public IP against the reputation payload.
///
/// Absent inputs, or an entry that is not an object, fall back to
/// [`Classification::unknown`]. Presence is checked explicitly, so a
/// coordinate of `0` renders as `"0"`.
pub fn classify(payload: Option<&ReputationPayload>, ip: Option<&str>) -> Classification {
    let entry = match (payload, ip) {
        (Some(payload), Some(ip)) => payload.entry(ip),
        _ => None,
    };

    let Some(entry) = entry else {
        return Classification::unknown();
    };

    Classification {
        is_vpn: entry.proxy.as_deref() == Some("yes"),
        is_tor: entry.tor.as_deref() == Some("1"),
        geo_location: GeoLocation {
            country: text_or_unknown(entry.country.as_deref()),
            region: text_or_unknown(entry.region.as_deref()),
            city: text_or_unknown(entry.city.as_deref()),
            latitude: coordinate_or_unknown(entry.latitude.as_ref()),
            longitude: coordinate_or_unknown(entry.longitude.as_ref()),
        },
        risk: entry.risk,
    }
}

fn text_or_unknown(value: Option<&str>) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn coordinate_or_unknown(value: Option<&Coordinate>) -> String {
    match value {
        Some(c) => text_or_unknown(Some(&c.to_string())),
        None => UNKNOWN.to_string(),
    }
}
