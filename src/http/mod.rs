//! Debug HTTP server surfaced only in debug feature builds.
//!
//! Spawns a lightweight Axum server exposing health, telemetry and SSE
//! streams of per-frame output and calibration progress.

#[cfg(all(feature = "debug_http", debug_assertions))]
mod routes;
#[cfg(all(feature = "debug_http", debug_assertions))]
mod sse;

use crate::engine::TrainerEngine;

#[cfg(all(feature = "debug_http", debug_assertions))]
pub use routes::{build_router, run_http_server, DebugHttpState};

#[cfg(all(feature = "debug_http", debug_assertions))]
use log::{error, info, warn};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::net::SocketAddr;
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(all(feature = "debug_http", debug_assertions))]
use std::thread;

#[cfg(all(feature = "debug_http", debug_assertions))]
static SERVER_STARTED: AtomicBool = AtomicBool::new(false);

/// Spawn the debug HTTP server only when the feature flag and debug builds are enabled.
///
/// The server holds shared handles (telemetry, broadcast channels, baseline)
/// and never touches the engine's per-frame state.
#[cfg(all(feature = "debug_http", debug_assertions))]
pub fn spawn_if_enabled(engine: &TrainerEngine) {
    if SERVER_STARTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        warn!("Debug HTTP server already running");
        return;
    }

    let addr: SocketAddr = std::env::var("FORM_COACH_DEBUG_HTTP_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8787".to_string())
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8787)));

    let token = std::env::var("FORM_COACH_DEBUG_TOKEN")
        .unwrap_or_else(|_| "form-coach-debug".to_string());
    let preview = token.chars().take(4).collect::<String>();
    let state = DebugHttpState::from_engine(engine, token);

    let spawned = thread::Builder::new()
        .name("form-coach-debug-http".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("Failed to build tokio runtime for debug HTTP server: {}", err);
                    SERVER_STARTED.store(false, Ordering::SeqCst);
                    return;
                }
            };

            info!(
                "Debug HTTP server binding {} (token prefix {}***)",
                addr, preview
            );

            runtime.block_on(async move {
                if let Err(err) = run_http_server(state, addr).await {
                    error!("Debug HTTP server stopped: {}", err);
                }
            });
            SERVER_STARTED.store(false, Ordering::SeqCst);
        });
    if let Err(err) = spawned {
        error!("Failed to spawn debug HTTP thread: {}", err);
        SERVER_STARTED.store(false, Ordering::SeqCst);
    }
}

#[cfg(not(all(feature = "debug_http", debug_assertions)))]
#[allow(unused_variables)]
pub fn spawn_if_enabled(_engine: &TrainerEngine) {
    // Debug HTTP server disabled in this build.
}
