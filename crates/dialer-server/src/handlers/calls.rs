//! Handlers for `/api/calls` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/calls/{call_id}` | 404 if not stored |
//! | `GET`  | `/calls/{call_id}/provider` | 502 if the provider fails |
//! | `POST` | `/calls/{call_id}/end` | 404 if not stored, 502 if the provider fails |

use axum::{
  Json,
  extract::{Path, State},
};
use dialer_core::{
  call::CallRecord,
  gateway::{CallCenter, ProviderCall, VoiceProvider},
  store::CallRepository,
};
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

async fn stored<R: CallRepository>(store: &R, call_id: &str) -> Result<CallRecord, ApiError> {
  store
    .get(call_id)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| ApiError::NotFound(format!("call {call_id} not found")))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /calls/{call_id}`
pub async fn get_one<R, V, C>(
  State(state): State<AppState<R, V, C>>,
  Path(call_id): Path<String>,
) -> Result<Json<CallRecord>, ApiError>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  Ok(Json(stored(state.store.as_ref(), &call_id).await?))
}

// ─── Provider view ────────────────────────────────────────────────────────────

/// `GET /calls/{call_id}/provider`
///
/// Only calls this service placed are looked up at the provider.
pub async fn provider_status<R, V, C>(
  State(state): State<AppState<R, V, C>>,
  Path(call_id): Path<String>,
) -> Result<Json<ProviderCall>, ApiError>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  stored(state.store.as_ref(), &call_id).await?;
  let live = state.voice.get_status(&call_id).await.map_err(|e| {
    tracing::warn!(call_id = %call_id, error = %e, "failed to fetch provider call status");
    ApiError::upstream(e)
  })?;
  Ok(Json(live))
}

// ─── End ──────────────────────────────────────────────────────────────────────

/// `POST /calls/{call_id}/end`
///
/// Only asks the provider to hang up; the record changes when the provider's
/// terminal webhook arrives.
pub async fn end<R, V, C>(
  State(state): State<AppState<R, V, C>>,
  Path(call_id): Path<String>,
) -> Result<Json<Value>, ApiError>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  stored(state.store.as_ref(), &call_id).await?;
  state.voice.end_call(&call_id).await.map_err(|e| {
    tracing::error!(call_id = %call_id, error = %e, "failed to end call");
    ApiError::upstream(e)
  })?;
  tracing::info!(call_id = %call_id, "requested call end");
  Ok(Json(json!({ "success": true })))
}
