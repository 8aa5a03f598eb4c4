//! `POST /webhooks/call_status`
//!
//! Body: `{"call_id": "...", "status": "...", ...provider fields}`. The whole
//! payload is handed to the reconciler and kept on the record.
//!
//! | Status | Body |
//! |--------|------|
//! | 200 | `{"success": true}` |
//! | 400 | malformed JSON, or `call_id`/`status` missing or not strings |
//! | 404 | `{"error": "Call not found"}` |
//! | 500 | store failure |

use axum::{Json, body::Bytes, extract::State};
use dialer_core::{
  call::CallStatus,
  gateway::{CallCenter, VoiceProvider},
  store::CallRepository,
};
use dialer_engine::ReconcileError;
use serde_json::{Value, json};

use crate::{AppState, error::ApiError};

pub async fn call_status<R, V, C>(
  State(state): State<AppState<R, V, C>>,
  body: Bytes,
) -> Result<Json<Value>, ApiError>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  let payload: Value = serde_json::from_slice(&body)
    .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;

  let call_id = required_str(&payload, "call_id")?.to_owned();
  let status = CallStatus::from(required_str(&payload, "status")?);

  match state.reconciler.handle_status_event(&call_id, status, payload).await {
    Ok(_) => Ok(Json(json!({ "success": true }))),
    Err(ReconcileError::NotFound(_)) => Err(ApiError::NotFound("Call not found".into())),
    Err(e) => {
      tracing::error!(call_id = %call_id, error = %e, "failed to apply call status event");
      Err(ApiError::internal(e))
    }
  }
}

fn required_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, ApiError> {
  payload
    .get(field)
    .and_then(Value::as_str)
    .ok_or_else(|| ApiError::BadRequest(format!("missing or non-string field `{field}`")))
}
