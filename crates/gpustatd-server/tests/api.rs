//! HTTP surface tests: auth gate, envelope shapes, validation, prefix routing.
//!
//! Each test drives the router in-process with `tower::ServiceExt::oneshot`
//! against a scripted provider, so no NVML driver (or listener) is needed.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gpustatd_core::provider::{
    DeviceMetrics, GpuMemory, ProcessMetrics, ProviderError, TelemetryProvider,
};
use gpustatd_server::{ServerConfig, build_router};

const GIB: u64 = 1024 * 1024 * 1024;

struct ScriptedProvider {
    device_count: u32,
    fail_count: bool,
    fail_metrics_at: Option<u32>,
}

impl ScriptedProvider {
    fn healthy(device_count: u32) -> Self {
        Self {
            device_count,
            fail_count: false,
            fail_metrics_at: None,
        }
    }
}

impl TelemetryProvider for ScriptedProvider {
    fn device_count(&self) -> Result<u32, ProviderError> {
        if self.fail_count {
            return Err(ProviderError::Unavailable("driver not loaded".to_string()));
        }
        Ok(self.device_count)
    }

    fn device_metrics(&self, idx: u32) -> Result<DeviceMetrics, ProviderError> {
        if self.fail_metrics_at == Some(idx) {
            return Err(ProviderError::Unavailable(format!(
                "GPU {idx} fell off the bus"
            )));
        }
        Ok(DeviceMetrics {
            name: "NVIDIA A100-SXM4-40GB".to_string(),
            fan_speed: 0,
            temperature: 48,
            power_status: "71W / 400W".to_string(),
            gpu_utilization: 12,
            memory_total: 40 * GIB,
            memory_used: 10 * GIB,
            memory_free: 30 * GIB,
        })
    }

    fn device_processes(&self, idx: u32) -> Result<BTreeMap<u32, ProcessMetrics>, ProviderError> {
        let mut processes = BTreeMap::new();
        processes.insert(
            1000 + idx,
            ProcessMetrics {
                username: "alice".to_string(),
                command: "python train.py".to_string(),
                kind: "C".to_string(),
                gpu_memory: GpuMemory::Known(9 * GIB),
            },
        );
        processes.insert(
            200 + idx,
            ProcessMetrics {
                username: "root".to_string(),
                command: "/usr/bin/Xorg".to_string(),
                kind: "G".to_string(),
                gpu_memory: GpuMemory::Unavailable,
            },
        );
        Ok(processes)
    }
}

fn app(provider: ScriptedProvider, prefix: &str, token: &str) -> Router {
    let config = ServerConfig::new("127.0.0.1", 0, prefix, token);
    build_router(Arc::new(provider), &config)
}

async fn get(router: &Router, uri: &str, auth: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(value) = auth {
        request = request.header(header::AUTHORIZATION, value);
    }
    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

// ---------------------------------------------------------------------------
// auth gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn open_access_when_no_token_configured() {
    let router = app(ScriptedProvider::healthy(1), "", "");
    let (status, body) = get(&router, "/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
}

#[tokio::test]
async fn matching_token_passes() {
    let router = app(ScriptedProvider::healthy(1), "", "sekrit");
    let (status, body) = get(&router, "/count", Some("sekrit")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], 1);
}

#[tokio::test]
async fn wrong_or_missing_token_rejected_with_envelope() {
    let router = app(ScriptedProvider::healthy(1), "", "sekrit");

    for auth in [Some("wrong"), Some("Bearer sekrit"), None] {
        let (status, body) = get(&router, "/status", auth).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            serde_json::json!({"code": 401, "data": null, "error": "Unauthorized"})
        );
    }
}

// ---------------------------------------------------------------------------
// /count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn count_returns_device_total() {
    let router = app(ScriptedProvider::healthy(4), "", "");
    let (status, body) = get(&router, "/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({"code": 0, "data": 4}));
}

#[tokio::test]
async fn count_provider_failure_maps_to_internal() {
    let mut provider = ScriptedProvider::healthy(1);
    provider.fail_count = true;
    let router = app(provider, "", "");

    let (status, body) = get(&router, "/count", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        serde_json::json!({"code": 2, "data": null, "error": "driver not loaded"})
    );
}

// ---------------------------------------------------------------------------
// /status validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_rejects_out_of_range_index() {
    let router = app(ScriptedProvider::healthy(2), "", "");
    let (status, body) = get(&router, "/status?idx=2", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        serde_json::json!({"code": 1, "data": null, "error": "Invalid GPU index"})
    );
}

#[tokio::test]
async fn status_rejects_non_integer_index() {
    let router = app(ScriptedProvider::healthy(2), "", "");
    let (status, body) = get(&router, "/status?idx=0,x", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid GPU index");
}

#[tokio::test]
async fn status_rejects_unknown_process_type() {
    let router = app(ScriptedProvider::healthy(2), "", "");
    let (status, body) = get(&router, "/status?process=X", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        serde_json::json!({
            "code": 1,
            "data": null,
            "error": "Invalid process type, choose from C, G, NA"
        })
    );
}

// ---------------------------------------------------------------------------
// /status success and failure envelopes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_success_envelope_and_ordering() {
    let router = app(ScriptedProvider::healthy(2), "", "");
    let (status, body) = get(&router, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert!(body.get("error").is_none(), "error key omitted on success");

    let data = &body["data"];
    assert_eq!(data["count"], 2);
    assert_eq!(data["devices"].as_array().unwrap().len(), 2);
    assert_eq!(data["devices"][0]["idx"], 0);
    assert_eq!(data["devices"][1]["idx"], 1);
    assert_eq!(data["devices"][0]["memory_utilization"], 25);
    assert_eq!(data["devices"][0]["memory_total_human"], "40960MiB");

    // Grouped by device order, ascending pid within each device.
    let flat: Vec<(u64, u64)> = data["processes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["idx"].as_u64().unwrap(), p["pid"].as_u64().unwrap()))
        .collect();
    assert_eq!(flat, vec![(0, 200), (0, 1000), (1, 201), (1, 1001)]);
}

#[tokio::test]
async fn status_filter_and_duplicate_indices() {
    let router = app(ScriptedProvider::healthy(2), "", "");
    let (status, body) = get(&router, "/status?idx=0,0&process=C", None).await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    // count stays the total visible device count under filtering.
    assert_eq!(data["count"], 2);
    let devices = data["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["idx"], 0);
    assert_eq!(devices[1]["idx"], 0);

    for process in data["processes"].as_array().unwrap() {
        assert!(process["type"].as_str().unwrap().contains("C"));
    }
    assert_eq!(data["processes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn status_discards_partial_results_on_mid_walk_failure() {
    let mut provider = ScriptedProvider::healthy(2);
    provider.fail_metrics_at = Some(1);
    let router = app(provider, "", "");

    let (status, body) = get(&router, "/status?idx=0,1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        serde_json::json!({"code": 2, "data": null, "error": "GPU 1 fell off the bus"})
    );
}

#[tokio::test]
async fn status_unavailable_process_memory_is_na() {
    let router = app(ScriptedProvider::healthy(1), "", "");
    let (_, body) = get(&router, "/status", None).await;
    let processes = body["data"]["processes"].as_array().unwrap();
    assert_eq!(processes[0]["gpu_memory"], "N/A");
    assert_eq!(processes[1]["gpu_memory"], "9216MiB");
}

// ---------------------------------------------------------------------------
// prefix routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prefix_moves_both_endpoints() {
    let router = app(ScriptedProvider::healthy(1), "gpu", "");

    let (status, body) = get(&router, "/gpu/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/count").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let (status, _) = get(&router, "/gpu/status", None).await;
    assert_eq!(status, StatusCode::OK);
}
