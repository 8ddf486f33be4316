//! Mission log entry types
//!
//! Log payloads are display-oriented: every value is a primitive, and
//! anything structured is rendered to text before it is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{DroneId, GeoPoint};

/// A single primitive value in a log payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogValue {
    Flag(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogValue::Flag(b) => write!(f, "{}", b),
            LogValue::Integer(i) => write!(f, "{}", i),
            LogValue::Number(n) => write!(f, "{}", n),
            LogValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for LogValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

impl From<i64> for LogValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u8> for LogValue {
    fn from(i: u8) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<usize> for LogValue {
    fn from(i: usize) -> Self {
        Self::Integer(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for LogValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for LogValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for LogValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<GeoPoint> for LogValue {
    fn from(p: GeoPoint) -> Self {
        Self::Text(p.to_string())
    }
}

/// Flat key/value payload attached to a log entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogData(BTreeMap<String, LogValue>);

impl LogData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<LogValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a value rounded to a whole number for display
    pub fn with_rounded(self, key: impl Into<String>, value: f64) -> Self {
        let rounded = if value.is_finite() { value.round() as i64 } else { 0 };
        self.with(key, rounded)
    }

    pub fn get(&self, key: &str) -> Option<&LogValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LogValue)> {
        self.0.iter()
    }
}

/// One audit-trail record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: u64,
    pub drone_id: DroneId,
    pub drone_name: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub data: LogData,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_data_builder() {
        let data = LogData::new()
            .with("waypoints", 3usize)
            .with_rounded("distance", 222.38)
            .with("emergency", false)
            .with("start", GeoPoint::new(1.5, 2.25));

        assert_eq!(data.len(), 4);
        assert_eq!(data.get("distance"), Some(&LogValue::Integer(222)));
        assert_eq!(data.get("start"), Some(&LogValue::Text("1.500000, 2.250000".into())));
    }

    #[test]
    fn test_log_data_serializes_flat() {
        let data = LogData::new().with("battery", 98u8).with("phase", "LANDING");
        let json = serde_json::to_value(&data).unwrap();

        assert_eq!(json["battery"], 98);
        assert_eq!(json["phase"], "LANDING");
    }
}
