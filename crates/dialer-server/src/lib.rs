//! HTTP surface of the dialer.
//!
//! Exposes an axum [`Router`] with the provider webhook, a health probe and a
//! small JSON admin API, backed by any [`CallRepository`], [`VoiceProvider`]
//! and [`CallCenter`].
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/health` | Liveness probe |
//! | `POST` | `/webhooks/call_status` | Provider call-status events |
//! | `GET`  | `/api/calls/{call_id}` | Stored record |
//! | `GET`  | `/api/calls/{call_id}/provider` | Live provider view |
//! | `POST` | `/api/calls/{call_id}/end` | Hang up a call |
//! | `GET`  | `/api/campaigns/{campaign_id}/calls` | Recent records, `?limit=` |
//! | `GET`  | `/api/campaigns/{campaign_id}/stats` | `?from=&to=` (RFC 3339) |
//! | `POST` | `/api/campaigns/{campaign_id}/dispatch` | Run one dispatch pass |

pub mod error;
pub mod handlers;
pub mod scheduler;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use dialer_core::{
  gateway::{CallCenter, VoiceProvider},
  store::CallRepository,
};
use dialer_engine::{Dispatcher, Reconciler};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use handlers::{calls, campaigns, health, webhook};

/// Concurrency cap used when a dispatch request or schedule names none.
pub const DEFAULT_MAX_CONCURRENT: u64 = 5;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `DIALER_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Public base URL the voice provider calls back on.
  pub webhook_base_url: String,
  pub voice_api_key:    String,
  /// `retell` or `vapi`.
  pub voice_service:    String,
  /// Overrides the service's default API root.
  #[serde(default)]
  pub voice_base_url:   Option<String>,
  pub vicidial_url:     String,
  pub vicidial_user:    String,
  pub vicidial_pass:    String,
  #[serde(default)]
  pub campaigns:        Vec<CampaignSchedule>,
}

/// A campaign dispatched periodically by the [`scheduler`].
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CampaignSchedule {
  pub campaign_id:    String,
  pub script_id:      String,
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: u64,
  #[serde(default = "default_interval_secs")]
  pub interval_secs:  u64,
}

fn default_max_concurrent() -> u64 { DEFAULT_MAX_CONCURRENT }

fn default_interval_secs() -> u64 { 60 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<R, V, C> {
  pub store:      Arc<R>,
  pub voice:      Arc<V>,
  pub dispatcher: Arc<Dispatcher<R, V, C>>,
  pub reconciler: Arc<Reconciler<R, V, C>>,
}

impl<R, V, C> Clone for AppState<R, V, C> {
  fn clone(&self) -> Self {
    Self {
      store:      self.store.clone(),
      voice:      self.voice.clone(),
      dispatcher: self.dispatcher.clone(),
      reconciler: self.reconciler.clone(),
    }
  }
}

impl<R, V, C> AppState<R, V, C>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  /// Wire the dispatcher and reconciler around one set of collaborators.
  pub fn new(store: Arc<R>, voice: Arc<V>, call_center: Arc<C>, webhook_base_url: &str) -> Self {
    let dispatcher = Dispatcher::new(
      store.clone(),
      voice.clone(),
      call_center.clone(),
      webhook_base_url,
    );
    let reconciler = Reconciler::new(store.clone(), voice.clone(), call_center);
    Self {
      store,
      voice,
      dispatcher: Arc::new(dispatcher),
      reconciler: Arc::new(reconciler),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application [`Router`].
pub fn router<R, V, C>(state: AppState<R, V, C>) -> Router
where
  R: CallRepository + 'static,
  V: VoiceProvider + 'static,
  C: CallCenter + 'static,
{
  let api = Router::new()
    // Calls
    .route("/calls/{call_id}", get(calls::get_one::<R, V, C>))
    .route("/calls/{call_id}/provider", get(calls::provider_status::<R, V, C>))
    .route("/calls/{call_id}/end", post(calls::end::<R, V, C>))
    // Campaigns
    .route("/campaigns/{campaign_id}/calls", get(campaigns::list_calls::<R, V, C>))
    .route("/campaigns/{campaign_id}/stats", get(campaigns::stats::<R, V, C>))
    .route("/campaigns/{campaign_id}/dispatch", post(campaigns::dispatch::<R, V, C>));

  Router::new()
    .route("/health", get(health::handler))
    .route("/webhooks/call_status", post(webhook::call_status::<R, V, C>))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use chrono::{Duration, TimeZone, Utc};
  use dialer_core::{
    call::{CallStatus, CallUpdate, NewCall},
    campaign::LeadStatus,
  };
  use dialer_engine::testing::{FakeCallCenter, FakeVoice};
  use dialer_store_sqlite::SqliteCallStore;
  use serde_json::{Map, Value, json};
  use tower::ServiceExt as _;

  type TestState = AppState<SqliteCallStore, FakeVoice, FakeCallCenter>;

  struct Harness {
    state:       TestState,
    voice:       Arc<FakeVoice>,
    call_center: Arc<FakeCallCenter>,
  }

  async fn harness(call_center: FakeCallCenter) -> Harness {
    let store = Arc::new(SqliteCallStore::open_in_memory().await.unwrap());
    let voice = Arc::new(FakeVoice::new());
    let call_center = Arc::new(call_center);
    let state = AppState::new(store, voice.clone(), call_center.clone(), "https://dialer.example");
    Harness { state, voice, call_center }
  }

  async fn seed_call(state: &TestState, call_id: &str, campaign_id: &str) {
    state
      .store
      .create(NewCall {
        call_id:      call_id.to_string(),
        lead_id:      format!("lead-of-{call_id}"),
        phone_number: "+15550100".to_string(),
        campaign_id:  campaign_id.to_string(),
        start_time:   Utc::now(),
        metadata:     Map::new(),
      })
      .await
      .unwrap();
  }

  async fn send(state: &TestState, method: &str, uri: &str, body: &str) -> Response {
    let req = Request::builder()
      .method(method)
      .uri(uri)
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap();
    router(state.clone()).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  // ── Health ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_reports_healthy() {
    let h = harness(FakeCallCenter::new()).await;
    let resp = send(&h.state, "GET", "/health", "").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = json_body(resp).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_f64().unwrap() > 0.0);
  }

  // ── Webhook ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn webhook_for_unknown_call_is_404() {
    let h = harness(FakeCallCenter::new()).await;
    let resp = send(
      &h.state,
      "POST",
      "/webhooks/call_status",
      r#"{"call_id":"ghost","status":"completed"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await, json!({ "error": "Call not found" }));
    assert!(h.state.store.get("ghost").await.unwrap().is_none());
    assert!(h.call_center.status_updates().is_empty());
  }

  #[tokio::test]
  async fn webhook_completed_marks_lead_completed() {
    let h = harness(FakeCallCenter::new()).await;
    seed_call(&h.state, "c-1", "camp").await;

    let resp = send(
      &h.state,
      "POST",
      "/webhooks/call_status",
      r#"{"call_id":"c-1","status":"completed","duration":42}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "success": true }));

    let stored = h.state.store.get("c-1").await.unwrap().unwrap();
    assert_eq!(stored.status, CallStatus::Completed);
    assert!(stored.end_time.is_some());
    assert_eq!(stored.metadata["last_event"]["duration"], 42);
    assert_eq!(h.call_center.status_updates(), [(
      "lead-of-c-1".to_string(),
      LeadStatus::AiCompleted
    )]);
  }

  #[tokio::test]
  async fn webhook_failed_marks_lead_no_answer() {
    let h = harness(FakeCallCenter::new()).await;
    seed_call(&h.state, "c-2", "camp").await;

    let resp = send(
      &h.state,
      "POST",
      "/webhooks/call_status",
      r#"{"call_id":"c-2","status":"failed"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.call_center.status_updates(), [(
      "lead-of-c-2".to_string(),
      LeadStatus::AiNoAnswer
    )]);
  }

  #[tokio::test]
  async fn malformed_webhooks_are_rejected_without_side_effects() {
    let h = harness(FakeCallCenter::new()).await;
    seed_call(&h.state, "c-3", "camp").await;
    let before = h.state.store.get("c-3").await.unwrap();

    for body in [
      "not json",
      r#"{"status":"completed"}"#,
      r#"{"call_id":"c-3"}"#,
      r#"{"call_id":3,"status":"completed"}"#,
      r#"["c-3","completed"]"#,
    ] {
      let resp = send(&h.state, "POST", "/webhooks/call_status", body).await;
      assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body}");
      assert!(json_body(resp).await["error"].is_string());
    }

    assert_eq!(h.state.store.get("c-3").await.unwrap(), before);
    assert!(h.call_center.status_updates().is_empty());
  }

  // ── Calls API ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn get_call_returns_record_or_404() {
    let h = harness(FakeCallCenter::new()).await;
    seed_call(&h.state, "c-4", "camp").await;

    let resp = send(&h.state, "GET", "/api/calls/c-4", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["call_id"], "c-4");
    assert_eq!(body["status"], "initiated");

    let resp = send(&h.state, "GET", "/api/calls/missing", "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn provider_view_comes_from_voice_service() {
    let h = harness(FakeCallCenter::new()).await;
    seed_call(&h.state, "c-5", "camp").await;

    let resp = send(&h.state, "GET", "/api/calls/c-5/provider", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["id"], "c-5");
  }

  #[tokio::test]
  async fn provider_view_requires_known_call() {
    let h = harness(FakeCallCenter::new()).await;

    for uri in ["/api/calls/unknown/provider", "/api/calls/..%2Fassistants/provider"] {
      let resp = send(&h.state, "GET", uri, "").await;
      assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
      assert!(json_body(resp).await["error"].is_string());
    }
  }

  #[tokio::test]
  async fn end_call_requires_known_call() {
    let h = harness(FakeCallCenter::new()).await;
    seed_call(&h.state, "c-6", "camp").await;

    let resp = send(&h.state, "POST", "/api/calls/unknown/end", "").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&h.state, "POST", "/api/calls/c-6/end", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.voice.ended(), ["c-6".to_string()]);
  }

  // ── Campaigns API ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn dispatch_places_calls_with_default_cap() {
    let h = harness(FakeCallCenter::with_leads(8)).await;

    let resp = send(
      &h.state,
      "POST",
      "/api/campaigns/spring/dispatch",
      r#"{"script_id":"script-1"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report = json_body(resp).await;
    assert_eq!(report["available"], 5);
    assert_eq!(report["initiated"].as_array().unwrap().len(), 5);
    assert_eq!(h.voice.created().len(), 5);
    assert_eq!(
      h.voice.created()[0].webhook_url,
      "https://dialer.example/webhooks/call_status"
    );

    let resp = send(&h.state, "GET", "/api/campaigns/spring/calls?limit=2", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn dispatch_honours_requested_cap() {
    let h = harness(FakeCallCenter::with_leads(8)).await;

    let resp = send(
      &h.state,
      "POST",
      "/api/campaigns/spring/dispatch",
      r#"{"script_id":"script-1","max_concurrent":2}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["initiated"].as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn dispatch_lead_failure_is_bad_gateway() {
    let h = harness(FakeCallCenter::with_leads(2).fail_leads()).await;

    let resp = send(
      &h.state,
      "POST",
      "/api/campaigns/spring/dispatch",
      r#"{"script_id":"script-1"}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(h.voice.created().is_empty());
  }

  #[tokio::test]
  async fn stats_aggregate_completed_calls() {
    let h = harness(FakeCallCenter::new()).await;
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    for (id, status, secs) in [
      ("s-1", CallStatus::Completed, Some(120)),
      ("s-2", CallStatus::Completed, Some(200)),
      ("s-3", CallStatus::InProgress, None),
    ] {
      h.state
        .store
        .create(NewCall {
          call_id:      id.to_string(),
          lead_id:      format!("lead-{id}"),
          phone_number: "+15550100".to_string(),
          campaign_id:  "stats".to_string(),
          start_time:   start,
          metadata:     Map::new(),
        })
        .await
        .unwrap();
      h.state
        .store
        .update(id, CallUpdate {
          status: Some(status),
          end_time: secs.map(|s| start + Duration::seconds(s)),
          ..CallUpdate::default()
        })
        .await
        .unwrap();
    }

    let resp = send(&h.state, "GET", "/api/campaigns/stats/stats", "").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = json_body(resp).await;
    assert_eq!(stats["total_calls"], 3);
    assert_eq!(stats["completed_calls"], 2);
    assert_eq!(stats["avg_duration"].as_f64(), Some(160.0));

    let resp = send(
      &h.state,
      "GET",
      "/api/campaigns/stats/stats?from=2024-03-02T00:00:00Z",
      "",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let stats = json_body(resp).await;
    assert_eq!(stats["total_calls"], 0);
    assert!(stats["avg_duration"].is_null());
  }
}
