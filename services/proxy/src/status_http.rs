//! Local status HTTP server.
//!
//! Provides:
//! - `GET /healthz` — always 200 once the process is up
//! - `GET /readyz`  — 200 once at least one relay connection has been
//!   established during warm-up, 503 otherwise
//!
//! # Readiness contract
//! Mirrors the relay-connect warm-up rule of §5: readiness does not flip
//! until either a relay connects or the 6 s fatal-init window elapses
//! without one.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct SubsystemStatus {
    ready: AtomicBool,
}

impl SubsystemStatus {
    pub fn new() -> Arc<Self> {
        Arc::new(SubsystemStatus::default())
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

pub fn build_router(status: Arc<SubsystemStatus>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(Extension(status))
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn readyz(Extension(status): Extension<Arc<SubsystemStatus>>) -> impl IntoResponse {
    if status.is_ready() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}
