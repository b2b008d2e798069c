//! HTTP GPU status server.
//!
//! Two endpoints behind an optional bearer-token gate:
//!
//! - `GET {prefix}/count` — number of visible GPUs.
//! - `GET {prefix}/status?idx=<comma-list>&process=<C|G|NA>` — point-in-time
//!   device and process snapshot.
//!
//! Every body is the uniform [`envelope::Envelope`] shape. Provider calls run
//! synchronously in the handler; a slow driver call stalls that request for
//! its duration (no timeout, no retry, no cache).

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::Deserialize;

use gpustatd_core::provider::TelemetryProvider;
use gpustatd_core::status::{self, ProcessFilter, StatusError, StatusPayload};

pub mod config;
pub mod envelope;

pub use config::ServerConfig;
use envelope::Envelope;

/// Shared server state.
struct AppState {
    provider: Arc<dyn TelemetryProvider>,
    token: String,
}

#[derive(Deserialize)]
struct StatusParams {
    idx: Option<String>,
    process: Option<String>,
}

/// Byte-for-byte comparison without an early exit on the first mismatch.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Auth gate: pass-through when no token is configured, otherwise the
/// `Authorization` header must equal the token exactly (no scheme parsing).
async fn require_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.token.is_empty() {
        return next.run(request).await;
    }
    let supplied = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if constant_time_eq(supplied.as_bytes(), state.token.as_bytes()) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(Envelope::<()>::unauthorized()),
        )
            .into_response()
    }
}

fn status_failure(err: &StatusError) -> (StatusCode, Json<Envelope<StatusPayload>>) {
    if err.is_validation() {
        (
            StatusCode::BAD_REQUEST,
            Json(Envelope::validation(err.to_string())),
        )
    } else {
        log::error!("status request failed: {err}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Envelope::internal(err.to_string())),
        )
    }
}

async fn handle_count(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Envelope<u32>>) {
    match state.provider.device_count() {
        Ok(count) => (StatusCode::OK, Json(Envelope::ok(count))),
        Err(err) => {
            log::error!("device count failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Envelope::internal(err.to_string())),
            )
        }
    }
}

async fn handle_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> (StatusCode, Json<Envelope<StatusPayload>>) {
    // Fresh total for this request; index validation runs against it.
    let device_count = match state.provider.device_count() {
        Ok(count) => count,
        Err(err) => return status_failure(&StatusError::Provider(err)),
    };

    let indices = match status::resolve_indices(params.idx.as_deref(), device_count) {
        Ok(indices) => indices,
        Err(err) => return status_failure(&err),
    };
    let filter = match ProcessFilter::parse(params.process.as_deref()) {
        Ok(filter) => filter,
        Err(err) => return status_failure(&err),
    };

    match status::collect_status(state.provider.as_ref(), &indices, filter, device_count) {
        Ok(payload) => (StatusCode::OK, Json(Envelope::ok(payload))),
        Err(err) => status_failure(&err),
    }
}

/// Build the axum router.
pub fn build_router(provider: Arc<dyn TelemetryProvider>, config: &ServerConfig) -> Router {
    let state = Arc::new(AppState {
        provider,
        token: config.token.clone(),
    });

    Router::new()
        .route(&format!("{}/count", config.prefix), get(handle_count))
        .route(&format!("{}/status", config.prefix), get(handle_status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ))
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn run_server(
    provider: Arc<dyn TelemetryProvider>,
    config: &ServerConfig,
) -> std::io::Result<()> {
    let app = build_router(provider, config);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}, prefix \"{}\"", config.prefix);
    axum::serve(listener, app).await
}
