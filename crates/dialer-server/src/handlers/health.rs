//! `GET /health`

use axum::Json;
use chrono::Utc;
use serde_json::{Value, json};

/// Liveness probe. `timestamp` is the current Unix time in seconds.
pub async fn handler() -> Json<Value> {
  let now = Utc::now();
  let timestamp = now.timestamp_micros() as f64 / 1_000_000.0;
  Json(json!({ "status": "healthy", "timestamp": timestamp }))
}
