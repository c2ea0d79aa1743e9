use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Timestamp fields scanned in order.
const TIMESTAMP_FIELDS: [&str; 4] = ["timestamp", "update_time", "publish_time", "time"];

/// Epoch values above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// Outcome of looking up an observation's timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampField {
    Missing,
    Parsed(DateTime<Utc>),
    Malformed(String),
}

/// A provider's raw record before it is scored or fused.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawObservation {
    fields: Map<String, Value>,
}

impl RawObservation {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builds from any JSON value; non-objects give an empty observation.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Numeric value of `field`. Numeric strings are accepted.
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.fields.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field)? {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Present, non-null and not an empty string.
    pub fn is_present(&self, field: &str) -> bool {
        match self.fields.get(field) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        }
    }

    pub fn timestamp(&self) -> TimestampField {
        let Some(raw) = TIMESTAMP_FIELDS
            .iter()
            .find_map(|f| self.fields.get(*f).filter(|v| !v.is_null()))
        else {
            return TimestampField::Missing;
        };

        match raw {
            Value::String(s) if s.trim().is_empty() => TimestampField::Missing,
            Value::String(s) => parse_text_timestamp(s.trim())
                .map(TimestampField::Parsed)
                .unwrap_or_else(|| TimestampField::Malformed(s.clone())),
            Value::Number(n) => n
                .as_f64()
                .and_then(parse_epoch)
                .map(TimestampField::Parsed)
                .unwrap_or_else(|| TimestampField::Malformed(n.to_string())),
            other => TimestampField::Malformed(other.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Value> for RawObservation {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn parse_text_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Providers commonly send "YYYY-MM-DD HH:MM:SS" without an offset.
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    s.parse::<f64>().ok().and_then(parse_epoch)
}

fn parse_epoch(v: f64) -> Option<DateTime<Utc>> {
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    let millis = if v >= EPOCH_MILLIS_THRESHOLD { v } else { v * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}
