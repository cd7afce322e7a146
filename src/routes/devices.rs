//! Device listing, statistics and history endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::models::{DeviceId, Reading, StatsSummary};
use crate::readings;
use crate::routes::metrics::Endpoint;
use crate::state::AppState;

/// Query parameters for the per-device endpoints
#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
}

/// Extract a non-empty `deviceId`; unparseable query strings are client errors too
fn require_device_id(
    params: std::result::Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<String> {
    let Query(params) = params.map_err(|e| AppError::ClientInput(e.body_text()))?;
    params
        .device_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::ClientInput("Missing deviceId parameter".into()))
}

/// Count and log a failed request before it is turned into a response
fn observe<T>(state: &AppState, endpoint: Endpoint, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        state.metrics.record_error(err);
        match err {
            AppError::ClientInput(msg) => warn!(?endpoint, error = %msg, "Rejected request"),
            AppError::Upstream(msg) => error!(?endpoint, error = %msg, "Store request failed"),
        }
    }
    result
}

/// GET /api/GetDevices
///
/// Returns the distinct device identifiers found in the store.
pub async fn get_devices(State(state): State<AppState>) -> Result<Json<Vec<DeviceId>>> {
    state.metrics.inc_requests(Endpoint::Devices);

    let devices = observe(
        &state,
        Endpoint::Devices,
        readings::list_devices(state.store.as_ref()).await,
    )?;

    info!(devices = devices.len(), "Devices listed");
    Ok(Json(devices))
}

/// GET /api/GetDeviceStats?deviceId=<id>
///
/// Returns average temperature and humidity, first and last timestamp and the
/// reading count for one device. Unknown devices get the all-default summary.
pub async fn get_device_stats(
    State(state): State<AppState>,
    params: std::result::Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<Json<StatsSummary>> {
    state.metrics.inc_requests(Endpoint::DeviceStats);

    let device_id = observe(&state, Endpoint::DeviceStats, require_device_id(params))?;
    let summary = observe(
        &state,
        Endpoint::DeviceStats,
        readings::device_stats(state.store.as_ref(), &device_id).await,
    )?;

    if summary.is_fallback() {
        state.metrics.inc_stats_fallbacks();
    }
    info!(device_id = %device_id, count = summary.count, "Device stats computed");
    Ok(Json(summary))
}

/// GET /api/GetDeviceHistory?deviceId=<id>
///
/// Returns every reading of one device, oldest first.
pub async fn get_device_history(
    State(state): State<AppState>,
    params: std::result::Result<Query<DeviceQuery>, QueryRejection>,
) -> Result<Json<Vec<Reading>>> {
    state.metrics.inc_requests(Endpoint::DeviceHistory);

    let device_id = observe(&state, Endpoint::DeviceHistory, require_device_id(params))?;
    let history = observe(
        &state,
        Endpoint::DeviceHistory,
        readings::device_history(state.store.as_ref(), &device_id).await,
    )?;

    info!(device_id = %device_id, readings = history.len(), "Device history fetched");
    Ok(Json(history))
}

#[cfg(test)]
mod tests {
    use crate::router;
    use crate::state::AppState;
    use crate::store::stub::StubStore;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn send(store: Arc<StubStore>, uri: &str) -> (AppState, Response) {
        let state = AppState::new(store);
        let response = router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        (state, response)
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_get_devices() {
        let store = Arc::new(StubStore::with_rows(vec![
            json!({ "deviceId": "sensor-01" }),
            json!({ "deviceId": "sensor-02" }),
        ]));

        let (_, response) = send(store.clone(), "/api/GetDevices").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "application/json"
        );
        assert_eq!(body_json(response).await, json!(["sensor-01", "sensor-02"]));
        assert_eq!(store.calls()[0].partition_key, None);
    }

    #[tokio::test]
    async fn test_get_device_stats() {
        let store = Arc::new(StubStore::with_rows(vec![json!({
            "avgTemp": 21.5,
            "avgHum": null,
            "minTS": "2024-01-01T00:00:00Z",
            "maxTS": "2024-01-02T00:00:00Z",
            "cnt": 10
        })]));

        let (_, response) = send(store.clone(), "/api/GetDeviceStats?deviceId=sensor-01").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "avgTemp": 21.5,
                "avgHum": 0.0,
                "minTS": "2024-01-01T00:00:00Z",
                "maxTS": "2024-01-02T00:00:00Z",
                "count": 10
            })
        );
        assert_eq!(store.calls()[0].partition_key.as_deref(), Some("sensor-01"));
    }

    #[tokio::test]
    async fn test_get_device_stats_unknown_device() {
        let store = Arc::new(StubStore::with_rows(vec![]));

        let (state, response) = send(store, "/api/GetDeviceStats?deviceId=ghost").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "avgTemp": 0.0, "avgHum": 0.0, "minTS": "N/A", "maxTS": "N/A", "count": 0 })
        );
        assert_eq!(state.metrics.get_metrics().stats_fallbacks_total, 1);
    }

    #[tokio::test]
    async fn test_missing_device_id_is_400_plain_text() {
        for uri in [
            "/api/GetDeviceStats",
            "/api/GetDeviceStats?deviceId=",
            "/api/GetDeviceHistory",
        ] {
            let store = Arc::new(StubStore::default());
            let (state, response) = send(store.clone(), uri).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert!(response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/plain"));
            assert_eq!(body_bytes(response).await, b"Missing deviceId parameter");
            assert!(store.calls().is_empty());
            assert_eq!(state.metrics.get_metrics().client_errors_total, 1);
        }
    }

    #[tokio::test]
    async fn test_rejected_query_string_is_counted_client_error() {
        let store = Arc::new(StubStore::default());

        let (state, response) = send(
            store.clone(),
            "/api/GetDeviceStats?deviceId=a&deviceId=b",
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(body.contains("deviceId"), "{}", body);
        assert!(store.calls().is_empty());
        assert_eq!(state.metrics.get_metrics().client_errors_total, 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_500_json() {
        for uri in [
            "/api/GetDevices",
            "/api/GetDeviceStats?deviceId=sensor-01",
            "/api/GetDeviceHistory?deviceId=sensor-01",
        ] {
            let store = Arc::new(StubStore::failing("connection refused"));
            let (state, response) = send(store, uri).await;

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
            assert_eq!(body_json(response).await, json!({ "error": "connection refused" }));
            assert_eq!(state.metrics.get_metrics().upstream_errors_total, 1);
        }
    }

    #[tokio::test]
    async fn test_get_device_history() {
        let store = Arc::new(StubStore::with_rows(vec![
            json!({ "deviceId": "sensor-01", "timestamp": "2024-01-01T00:00:00Z", "temperature": 21.0, "humidity": 40.0 }),
            json!({ "deviceId": "sensor-01", "timestamp": "2024-01-01T00:05:00Z", "temperature": 21.4, "humidity": 39.5 }),
        ]));

        let (_, response) = send(store.clone(), "/api/GetDeviceHistory?deviceId=sensor-01").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["timestamp"], "2024-01-01T00:00:00Z");
        assert_eq!(body[1]["temperature"], 21.4);
        assert_eq!(body[1]["deviceId"], "sensor-01");
        assert_eq!(store.calls()[0].partition_key.as_deref(), Some("sensor-01"));
    }

    #[tokio::test]
    async fn test_ready_reflects_store() {
        let (_, response) = send(Arc::new(StubStore::default()), "/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ready");

        let (_, response) = send(Arc::new(StubStore::failing("down")), "/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["checks"]["store"]["healthy"], false);
    }
}
