//! Core domain models for device statistics

use serde::{Deserialize, Serialize};

/// Opaque device identifier, also the store's partition key
pub type DeviceId = String;

/// Timestamp placeholder used when a device has no readings
pub const NO_TIMESTAMP: &str = "N/A";

/// A single sensor sample as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Device that produced the sample
    pub device_id: DeviceId,
    /// Device-produced ISO-8601 timestamp, passed through untouched
    pub timestamp: String,
    /// Temperature as reported by the device
    pub temperature: f64,
    /// Relative humidity as reported by the device
    pub humidity: f64,
}

/// Normalized aggregate over all readings of one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    #[serde(rename = "avgTemp")]
    pub avg_temp: f64,
    #[serde(rename = "avgHum")]
    pub avg_hum: f64,
    #[serde(rename = "minTS")]
    pub min_ts: String,
    #[serde(rename = "maxTS")]
    pub max_ts: String,
    pub count: u64,
}

impl StatsSummary {
    /// Summary served when no readings match the device
    pub fn fallback() -> Self {
        Self {
            avg_temp: 0.0,
            avg_hum: 0.0,
            min_ts: NO_TIMESTAMP.to_string(),
            max_ts: NO_TIMESTAMP.to_string(),
            count: 0,
        }
    }

    /// True when this is the all-default summary
    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }
}
