//! Reading queries against the document store

use std::collections::HashSet;

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;
use crate::models::{DeviceId, Reading, StatsSummary};
use crate::normalize::{normalize, StatsRow};
use crate::store::{DocumentStore, QueryParam};

pub(crate) const DEVICES_QUERY: &str = r#"SELECT DISTINCT c.device_id AS "deviceId" FROM c"#;

pub(crate) const STATS_QUERY: &str = r#"
SELECT
    AVG(c.temperature) AS "avgTemp",
    AVG(c.humidity) AS "avgHum",
    MIN(c."timestamp") AS "minTS",
    MAX(c."timestamp") AS "maxTS",
    COUNT(1) AS cnt
FROM c
WHERE c.device_id = @devId
GROUP BY c.device_id
"#;

const HISTORY_QUERY: &str = r#"
SELECT
    c.device_id AS "deviceId",
    c."timestamp",
    c.temperature,
    c.humidity
FROM c
WHERE c.device_id = @devId
ORDER BY c."timestamp" ASC
"#;

#[derive(Debug, Deserialize)]
struct DeviceRow {
    #[serde(rename = "deviceId")]
    device_id: DeviceId,
}

/// Distinct device identifiers across all partitions, first occurrence kept
pub async fn list_devices(store: &dyn DocumentStore) -> Result<Vec<DeviceId>> {
    let rows = store.execute(DEVICES_QUERY, &[], None).await?;

    let mut seen = HashSet::new();
    let mut devices = Vec::with_capacity(rows.len());
    for row in rows {
        let DeviceRow { device_id } = serde_json::from_value(row.into())?;
        if seen.insert(device_id.clone()) {
            devices.push(device_id);
        }
    }

    Ok(devices)
}

/// Aggregate statistics for one device, defaulted when it has no readings
pub async fn device_stats(store: &dyn DocumentStore, device_id: &str) -> Result<StatsSummary> {
    let params = [QueryParam::new("@devId", device_id)];
    let rows = store.execute(STATS_QUERY, &params, Some(device_id)).await?;

    // GROUP BY device_id yields at most one row
    let row = rows.into_iter().next().map(StatsRow::from_row).transpose()?;
    debug!(device_id = %device_id, found = row.is_some(), "Stats row fetched");

    Ok(normalize(row.as_ref()))
}

/// All readings of one device, ascending by timestamp
pub async fn device_history(store: &dyn DocumentStore, device_id: &str) -> Result<Vec<Reading>> {
    let params = [QueryParam::new("@devId", device_id)];
    let rows = store.execute(HISTORY_QUERY, &params, Some(device_id)).await?;

    let mut readings = rows
        .into_iter()
        .map(|row| serde_json::from_value::<Reading>(row.into()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    // The outer projection does not promise to keep the inner ORDER BY
    readings.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    Ok(readings)
}
