//! Handlers for `/api/campaigns` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/campaigns/{campaign_id}/calls` | `?limit=` (default 50, max 500) |
//! | `GET`  | `/campaigns/{campaign_id}/stats` | `?from=&to=` inclusive, RFC 3339 |
//! | `POST` | `/campaigns/{campaign_id}/dispatch` | Body: `{"script_id":"...","max_concurrent":5}` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use dialer_core::{
  call::CallRecord,
  campaign::{CampaignStats, StatsRange},
  gateway::{CallCenter, VoiceProvider},
  store::CallRepository,
};
use dialer_engine::{DispatchError, DispatchReport};
use serde::Deserialize;

use crate::{AppState, DEFAULT_MAX_CONCURRENT, error::ApiError};

const DEFAULT_LIST_LIMIT: usize = 50;
const MAX_LIST_LIMIT: usize = 500;

// ─── List calls ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /campaigns/{campaign_id}/calls[?limit=<n>]`
pub async fn list_calls<R, V, C>(
  State(state): State<AppState<R, V, C>>,
  Path(campaign_id): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<CallRecord>>, ApiError>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
  let calls = state
    .store
    .list_campaign_calls(&campaign_id, limit)
    .await
    .map_err(ApiError::internal)?;
  Ok(Json(calls))
}

// ─── Stats ────────────────────────────────────────────────────────────────────

/// `GET /campaigns/{campaign_id}/stats[?from=<rfc3339>&to=<rfc3339>]`
pub async fn stats<R, V, C>(
  State(state): State<AppState<R, V, C>>,
  Path(campaign_id): Path<String>,
  Query(range): Query<StatsRange>,
) -> Result<Json<CampaignStats>, ApiError>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  if let (Some(from), Some(to)) = (range.from, range.to)
    && from > to
  {
    return Err(ApiError::BadRequest("`from` is after `to`".into()));
  }

  let stats = state
    .store
    .campaign_stats(&campaign_id, range)
    .await
    .map_err(ApiError::internal)?;
  Ok(Json(stats))
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DispatchBody {
  pub script_id:      String,
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: u64,
}

fn default_max_concurrent() -> u64 { DEFAULT_MAX_CONCURRENT }

/// `POST /campaigns/{campaign_id}/dispatch`
///
/// Runs one dispatch pass to completion and returns its report.
pub async fn dispatch<R, V, C>(
  State(state): State<AppState<R, V, C>>,
  Path(campaign_id): Path<String>,
  Json(body): Json<DispatchBody>,
) -> Result<Json<DispatchReport>, ApiError>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  let report = state
    .dispatcher
    .run_campaign(&campaign_id, &body.script_id, body.max_concurrent)
    .await
    .map_err(|e| match e {
      DispatchError::Leads { .. } => ApiError::upstream(e),
      DispatchError::ActiveCount(_) => ApiError::internal(e),
    })?;
  Ok(Json(report))
}
