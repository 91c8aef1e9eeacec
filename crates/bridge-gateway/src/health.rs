//! Health endpoint (C9): `GET /healthz` only, everything else falls
//! through to axum's default 404.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::server::AppState;

pub async fn healthz(State(state): State<Arc<AppState>>) -> Json<Value> {
    let connections = state.connection_count.load(Ordering::SeqCst);
    Json(json!({"status": "ok", "connections": connections}))
}
