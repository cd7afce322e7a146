//! Stats row decoding and normalization
//!
//! The aggregate query returns at most one loosely typed row per device. It is
//! decoded into [`StatsRow`] right after the query runs, then [`normalize`]
//! fills deterministic defaults so callers always get a complete
//! [`StatsSummary`].

use serde::{de, Deserialize, Deserializer};
use serde_json::Value;

use crate::error::Result;
use crate::models::{StatsSummary, NO_TIMESTAMP};
use crate::store::Row;

/// Aggregate row as returned by the store, with typed but optional fields
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatsRow {
    #[serde(rename = "avgTemp", default, deserialize_with = "lenient_f64")]
    pub avg_temp: Option<f64>,
    #[serde(rename = "avgHum", default, deserialize_with = "lenient_f64")]
    pub avg_hum: Option<f64>,
    #[serde(rename = "minTS", default, deserialize_with = "lenient_string")]
    pub min_ts: Option<String>,
    #[serde(rename = "maxTS", default, deserialize_with = "lenient_string")]
    pub max_ts: Option<String>,
    /// Raw count, kept unclamped so `normalize` sees the store's value
    #[serde(default, deserialize_with = "lenient_count")]
    pub cnt: Option<f64>,
}

impl StatsRow {
    /// Decode a raw row mapping. Unknown keys are ignored.
    pub fn from_row(row: Row) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}

/// Build a summary from an optional aggregate row.
///
/// Absent rows and rows with `cnt == 0` yield [`StatsSummary::fallback`].
/// Otherwise each field is defaulted on its own.
pub fn normalize(row: Option<&StatsRow>) -> StatsSummary {
    let row = match row {
        Some(row) if row.cnt != Some(0.0) => row,
        _ => return StatsSummary::fallback(),
    };

    StatsSummary {
        avg_temp: row.avg_temp.unwrap_or(0.0),
        avg_hum: row.avg_hum.unwrap_or(0.0),
        min_ts: row.min_ts.clone().unwrap_or_else(|| NO_TIMESTAMP.to_string()),
        max_ts: row.max_ts.clone().unwrap_or_else(|| NO_TIMESTAMP.to_string()),
        count: row.cnt.map(clamp_count).unwrap_or(0),
    }
}

/// Decode then normalize a raw row mapping
pub fn normalize_row(row: Option<Row>) -> Result<StatsSummary> {
    let row = row.map(StatsRow::from_row).transpose()?;
    Ok(normalize(row.as_ref()))
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let number = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(de::Error::custom(format!("expected a finite number, got {}", value))),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(value @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(value.to_string())),
        Some(value) => Err(de::Error::custom(format!("expected a timestamp, got {}", value))),
    }
}

fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let count = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match count {
        Some(n) if n.is_finite() => Ok(Some(n)),
        _ => Err(de::Error::custom(format!("expected a row count, got {}", value))),
    }
}

/// Truncate towards zero, negatives become 0
fn clamp_count(f: f64) -> u64 {
    if f <= 0.0 {
        0
    } else {
        f.trunc() as u64
    }
}
