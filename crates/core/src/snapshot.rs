use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// A current/max reading such as health or mana.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricPair {
    pub current: Option<i64>,
    pub max: Option<i64>,
    pub confidence: f64,
}

/// A single-valued reading such as gold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricSingle {
    pub value: Option<i64>,
    pub confidence: f64,
}

/// Point-in-time view of the game as written by the external observer.
/// Built fresh on every read and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub health: Option<MetricPair>,
    pub mana: Option<MetricPair>,
    pub energy: Option<MetricPair>,
    pub gold: Option<MetricSingle>,
    pub potions: Option<MetricSingle>,
    pub warnings: Vec<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub window_present: Option<bool>,
    pub has_focus: Option<bool>,
    /// The full source object, including keys not modeled above.
    pub raw: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PairFields {
    current: Option<i64>,
    max: Option<i64>,
    confidence: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SingleFields {
    value: Option<i64>,
    confidence: Option<f64>,
}

impl From<PairFields> for MetricPair {
    fn from(f: PairFields) -> Self {
        MetricPair { current: f.current, max: f.max, confidence: f.confidence.unwrap_or(0.0) }
    }
}

impl From<SingleFields> for MetricSingle {
    fn from(f: SingleFields) -> Self {
        MetricSingle { value: f.value, confidence: f.confidence.unwrap_or(0.0) }
    }
}

/// Read and parse the snapshot at `path`. No caching: every call hits the disk.
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let bytes = std::fs::read(path).map_err(|e| BridgeError::from_io(path, e))?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|e| BridgeError::malformed(path, e))?;
    Snapshot::from_value(value, path)
}

/// Read the snapshot from the conventional cache location.
pub fn read_default() -> Result<Snapshot> {
    read_snapshot(&crate::bridge::BridgePaths::default().snapshot)
}

impl Snapshot {
    /// Parse snapshot text that did not come from a file.
    pub fn from_json_str(text: &str) -> Result<Snapshot> {
        let origin = Path::new("<inline>");
        let value: Value = serde_json::from_str(text).map_err(|e| BridgeError::malformed(origin, e))?;
        Snapshot::from_value(value, origin)
    }

    /// Build a snapshot from an already decoded JSON value. `origin` only
    /// labels errors.
    pub fn from_value(value: Value, origin: &Path) -> Result<Snapshot> {
        let Value::Object(raw) = value else {
            return Err(BridgeError::malformed(origin, "top level is not a JSON object"));
        };

        let pair = |key| field::<PairFields>(&raw, key, origin).map(|m| m.map(MetricPair::from));
        let single = |key| field::<SingleFields>(&raw, key, origin).map(|m| m.map(MetricSingle::from));

        let captured_at = match field::<String>(&raw, "CapturedUtc", origin)? {
            Some(text) => Some(parse_timestamp(&text).ok_or_else(|| {
                BridgeError::malformed(origin, format!("CapturedUtc: not a timestamp: {text}"))
            })?),
            None => None,
        };

        let warnings = match raw.get("Warnings") {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| BridgeError::malformed(origin, format!("Warnings: {e}")))?,
        };

        Ok(Snapshot {
            health: pair("Health")?,
            mana: pair("Mana")?,
            energy: pair("Energy")?,
            gold: single("Gold")?,
            potions: single("Potions")?,
            warnings,
            captured_at,
            window_present: field(&raw, "WindowPresent", origin)?,
            has_focus: field(&raw, "HasFocus", origin)?,
            raw,
        })
    }

    /// Copy of this snapshot with every metric read below `min_confidence`
    /// replaced by `None`.
    pub fn discounted(&self, min_confidence: f64) -> Snapshot {
        let mut s = self.clone();
        if min_confidence <= 0.0 {
            return s;
        }
        let keep_pair = |m: Option<MetricPair>| m.filter(|m| m.confidence >= min_confidence);
        let keep_single = |m: Option<MetricSingle>| m.filter(|m| m.confidence >= min_confidence);
        s.health = keep_pair(s.health);
        s.mana = keep_pair(s.mana);
        s.energy = keep_pair(s.energy);
        s.gold = keep_single(s.gold);
        s.potions = keep_single(s.potions);
        s
    }

    /// How old the observation is, if the producer stamped it.
    pub fn age(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.captured_at.map(|t| now - t)
    }

    pub fn health_current(&self) -> Option<i64> {
        self.health.and_then(|m| m.current)
    }

    pub fn mana_current(&self) -> Option<i64> {
        self.mana.and_then(|m| m.current)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn num(v: Option<i64>) -> String {
            v.map_or_else(|| "-".into(), |n| n.to_string())
        }
        fn pair(m: &Option<MetricPair>) -> String {
            match m {
                Some(m) => format!("{}/{} ({:.2})", num(m.current), num(m.max), m.confidence),
                None => "-".into(),
            }
        }
        let gold = match &self.gold {
            Some(g) => format!("{} ({:.2})", num(g.value), g.confidence),
            None => "-".into(),
        };
        write!(f, "hp {}  mp {}  gold {}", pair(&self.health), pair(&self.mana), gold)?;
        if !self.warnings.is_empty() {
            write!(f, "  [{} warning(s)]", self.warnings.len())?;
        }
        Ok(())
    }
}

/// Absent, null and empty values all mean "no reading".
fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Decode `key` when it holds a reading. A value of the wrong shape makes
/// the whole snapshot malformed.
fn field<T: DeserializeOwned>(raw: &Map<String, Value>, key: &str, origin: &Path) -> Result<Option<T>> {
    match raw.get(key) {
        Some(v) if !is_blank(v) => serde_json::from_value(v.clone())
            .map(Some)
            .map_err(|e| BridgeError::malformed(origin, format!("{key}: {e}"))),
        _ => Ok(None),
    }
}

/// Accepts RFC 3339 and the zone-less ISO form some producers emit (read as UTC).
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}
