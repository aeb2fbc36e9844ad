use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use anyhow::Context;
use axum::extract::{Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::calibration::Baseline;
use crate::engine::TrainerEngine;
use crate::managers::BroadcastChannelManager;
use crate::telemetry::{TelemetryCollector, TelemetryRecord, TelemetrySnapshot};

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct DebugHttpState {
    exercise: String,
    telemetry: Arc<TelemetryCollector>,
    broadcasts: BroadcastChannelManager,
    baseline: Arc<RwLock<Option<Baseline>>>,
    started: Instant,
    token: Arc<String>,
}

impl DebugHttpState {
    pub fn from_engine(engine: &TrainerEngine, token: String) -> Self {
        Self {
            exercise: engine.exercise().id.clone(),
            telemetry: engine.telemetry_handle(),
            broadcasts: engine.broadcasts(),
            baseline: engine.baseline_handle(),
            started: Instant::now(),
            token: Arc::new(token),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    Internal(String),
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token".into()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub exercise: String,
    pub uptime_ms: u64,
    pub calibrated: bool,
}

/// Telemetry endpoint response payload.
#[derive(Debug, Serialize)]
pub struct TelemetryResponse {
    pub latest: Option<TelemetryRecord>,
    pub baseline: Option<Baseline>,
    pub diagnostics: TelemetrySnapshot,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: DebugHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/telemetry", get(telemetry))
        .route("/frames-stream", get(frames_stream_handler))
        .route("/calibration-stream", get(calibration_stream_handler))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: DebugHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding debug HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving debug HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    Ok(Json(HealthResponse {
        status: "ok",
        exercise: state.exercise.clone(),
        uptime_ms: state.started.elapsed().as_millis() as u64,
        calibrated: read_baseline(&state)?.is_some(),
    }))
}

pub async fn telemetry(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<TelemetryResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let diagnostics = state.telemetry.snapshot();
    Ok(Json(TelemetryResponse {
        latest: diagnostics.recent.last().cloned(),
        baseline: read_baseline(&state)?,
        diagnostics,
    }))
}

pub async fn frames_stream_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::EventStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(sse::from_broadcast(
        state.broadcasts.subscribe_frames(),
        "frame",
    ))
}

pub async fn calibration_stream_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::EventStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(sse::from_broadcast(
        state.broadcasts.subscribe_calibration(),
        "calibration",
    ))
}

fn read_baseline(state: &DebugHttpState) -> Result<Option<Baseline>, HttpServerError> {
    state
        .baseline
        .read()
        .map(|baseline| baseline.clone())
        .map_err(|_| HttpServerError::Internal("baseline lock poisoned".to_string()))
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_DEBUG_TOKEN: HeaderName = HeaderName::from_static("x-debug-token");

    headers
        .get(&X_DEBUG_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}

#[cfg(all(test, feature = "debug_http"))]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::engine::EngineBuilder;
    use crate::feedback::MemorySink;
    use crate::telemetry::EngineEvent;

    const TOKEN: &str = "smoke-token";

    fn make_router() -> (Router, DebugHttpState) {
        let engine = EngineBuilder::for_exercise("squat")
            .expect("builtin exercise")
            .sink(Box::new(MemorySink::new()))
            .build()
            .expect("engine");
        let state = DebugHttpState::from_engine(&engine, TOKEN.to_string());
        (build_router(state.clone()), state)
    }

    async fn response_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let json = serde_json::from_slice::<Value>(&bytes).expect("JSON body");
        (status, json)
    }

    async fn get(router: Router, uri: String) -> (StatusCode, Value) {
        response_json(
            router
                .oneshot(
                    Request::builder()
                        .uri(uri)
                        .body(Body::empty())
                        .expect("request"),
                )
                .await
                .expect("call"),
        )
        .await
    }

    #[tokio::test]
    async fn health_requires_token() {
        let (router, _) = make_router();
        let (status, json) = get(router, "/health".to_string()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "missing or invalid token");
    }

    #[tokio::test]
    async fn health_succeeds_with_token() {
        let (router, _) = make_router();
        let (status, json) = get(router, format!("/health?token={TOKEN}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["exercise"], "squat");
        assert_eq!(json["calibrated"], false);
    }

    #[tokio::test]
    async fn bearer_header_is_accepted() {
        let (router, _) = make_router();
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(AUTHORIZATION, format!("Bearer {TOKEN}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("call");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn telemetry_reports_latest_event() {
        let (router, state) = make_router();
        state.telemetry.publish(EngineEvent::RepCompleted { reps: 2 });
        let (status, json) = get(router, format!("/telemetry?token={TOKEN}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["latest"]["event"]["type"], "rep_completed");
        assert_eq!(json["diagnostics"]["total_events"], 1);
    }
}
