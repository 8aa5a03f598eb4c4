//! Campaign dispatch: turn ready leads into AI calls under a concurrency cap.

use std::sync::Arc;

use chrono::Utc;
use dialer_core::{
  call::NewCall,
  campaign::{Lead, LeadStatus},
  gateway::{CallCenter, VoiceProvider},
  store::CallRepository,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::DispatchError;

/// Path the voice provider posts call-status events to.
pub const WEBHOOK_PATH: &str = "/webhooks/call_status";

/// What a single [`Dispatcher::run_campaign`] invocation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
  pub campaign_id: String,
  /// Non-terminal calls across all campaigns when the run started.
  pub active:      u64,
  /// Free slots under the cap, i.e. the most calls this run could place.
  pub available:   u64,
  /// Leads the run attempted to call.
  pub leads:       usize,
  /// Provider ids of the calls placed and recorded.
  pub initiated:   Vec<String>,
  /// Leads whose call could not be placed or recorded.
  pub failed:      usize,
}

/// Places AI calls for ready leads.
///
/// The active-call check and the inserts that follow it run under one
/// process-wide lock, so concurrent runs in this process cannot overshoot the
/// cap. Separate processes sharing the database can still race.
pub struct Dispatcher<R, V, C> {
  store:       Arc<R>,
  voice:       Arc<V>,
  call_center: Arc<C>,
  webhook_url: String,
  slots:       Mutex<()>,
}

impl<R, V, C> Dispatcher<R, V, C>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  pub fn new(store: Arc<R>, voice: Arc<V>, call_center: Arc<C>, webhook_base_url: &str) -> Self {
    Self {
      store,
      voice,
      call_center,
      webhook_url: format!("{}{WEBHOOK_PATH}", webhook_base_url.trim_end_matches('/')),
      slots: Mutex::new(()),
    }
  }

  /// The callback URL handed to the voice provider for every call.
  pub fn webhook_url(&self) -> &str { &self.webhook_url }

  /// Place calls for up to `max_concurrent - active` ready leads.
  ///
  /// Hitting the cap or finding no leads is a normal, successful run. A lead
  /// whose call fails is logged and skipped; only failing to read the active
  /// count or the lead list is an error.
  #[tracing::instrument(skip(self))]
  pub async fn run_campaign(
    &self,
    campaign_id: &str,
    script_id: &str,
    max_concurrent: u64,
  ) -> Result<DispatchReport, DispatchError> {
    let _slots = self.slots.lock().await;

    let active = self
      .store
      .count_active(None)
      .await
      .map_err(|e| DispatchError::ActiveCount(Box::new(e)))?;
    let available = max_concurrent.saturating_sub(active);

    let mut report = DispatchReport {
      campaign_id: campaign_id.to_owned(),
      active,
      available,
      leads: 0,
      initiated: Vec::new(),
      failed: 0,
    };

    if available == 0 {
      tracing::info!(active, max_concurrent, "maximum concurrent calls reached");
      return Ok(report);
    }

    let limit = usize::try_from(available).unwrap_or(usize::MAX);
    let leads = self
      .call_center
      .get_ready_leads(campaign_id, limit)
      .await
      .map_err(|e| DispatchError::Leads {
        campaign_id: campaign_id.to_owned(),
        source:      Box::new(e),
      })?;

    if leads.is_empty() {
      tracing::debug!("no ready leads");
      return Ok(report);
    }

    // The call center may hand back more than asked; never exceed the slots.
    for lead in leads.into_iter().take(limit) {
      report.leads += 1;
      match self.place_call(campaign_id, script_id, &lead).await {
        Some(call_id) => report.initiated.push(call_id),
        None => report.failed += 1,
      }
    }

    tracing::info!(
      initiated = report.initiated.len(),
      failed = report.failed,
      "campaign dispatch finished"
    );
    Ok(report)
  }

  /// Create, record and announce one call. Returns the call id once the
  /// record is stored; the lead-status push is best-effort. A call that
  /// cannot be recorded is ended again.
  async fn place_call(&self, campaign_id: &str, script_id: &str, lead: &Lead) -> Option<String> {
    let call_id = match self
      .voice
      .create_call(&lead.phone_number, script_id, &self.webhook_url)
      .await
    {
      Ok(id) => id,
      Err(e) => {
        tracing::error!(lead_id = %lead.lead_id, error = %e, "failed to create call");
        return None;
      }
    };

    let mut metadata = Map::new();
    metadata.insert("script_id".into(), Value::from(script_id));

    let new_call = NewCall {
      call_id:      call_id.clone(),
      lead_id:      lead.lead_id.clone(),
      phone_number: lead.phone_number.clone(),
      campaign_id:  campaign_id.to_owned(),
      start_time:   Utc::now(),
      metadata,
    };

    if let Err(e) = self.store.create(new_call).await {
      tracing::error!(
        call_id = %call_id,
        lead_id = %lead.lead_id,
        error = %e,
        "call placed but could not be recorded, ending it"
      );
      // An unrecorded call would never be reconciled.
      if let Err(e) = self.voice.end_call(&call_id).await {
        tracing::error!(call_id = %call_id, error = %e, "failed to end orphaned call");
      }
      return None;
    }

    if let Err(e) = self
      .call_center
      .update_lead_status(&lead.lead_id, LeadStatus::AiCallInProgress)
      .await
    {
      tracing::warn!(call_id = %call_id, lead_id = %lead.lead_id, error = %e, "failed to mark lead as in call");
    }

    tracing::info!(call_id = %call_id, lead_id = %lead.lead_id, "initiated call for lead");
    Some(call_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use dialer_core::{
    call::{CallStatus, CallUpdate},
    campaign::StatsRange,
  };
  use dialer_store_sqlite::SqliteCallStore;

  use crate::testing::{FakeCallCenter, FakeVoice};

  type TestDispatcher = Dispatcher<SqliteCallStore, FakeVoice, FakeCallCenter>;

  struct Harness {
    store:       Arc<SqliteCallStore>,
    voice:       Arc<FakeVoice>,
    call_center: Arc<FakeCallCenter>,
    dispatcher:  TestDispatcher,
  }

  async fn harness(voice: FakeVoice, call_center: FakeCallCenter) -> Harness {
    let store = Arc::new(SqliteCallStore::open_in_memory().await.unwrap());
    let voice = Arc::new(voice);
    let call_center = Arc::new(call_center);
    let dispatcher = Dispatcher::new(
      store.clone(),
      voice.clone(),
      call_center.clone(),
      "https://dialer.example/",
    );
    Harness { store, voice, call_center, dispatcher }
  }

  async fn seed_active(store: &SqliteCallStore, call_id: &str) {
    store
      .create(NewCall {
        call_id:      call_id.into(),
        lead_id:      format!("old-{call_id}"),
        phone_number: "+15559999".into(),
        campaign_id:  "camp".into(),
        start_time:   Utc::now(),
        metadata:     Map::new(),
      })
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn webhook_url_is_derived_from_base() {
    let h = harness(FakeVoice::new(), FakeCallCenter::new()).await;
    assert_eq!(h.dispatcher.webhook_url(), "https://dialer.example/webhooks/call_status");
  }

  #[tokio::test]
  async fn places_calls_for_every_ready_lead_within_cap() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(3)).await;

    let report = h.dispatcher.run_campaign("camp", "script-1", 5).await.unwrap();
    assert_eq!(report.available, 5);
    assert_eq!(report.leads, 3);
    assert_eq!(report.initiated, ["call-1", "call-2", "call-3"]);
    assert_eq!(report.failed, 0);
    assert_eq!(h.call_center.lead_requests(), [("camp".to_string(), 5)]);

    let created = h.voice.created();
    assert_eq!(created.len(), 3);
    assert!(created.iter().all(|c| c.script_id == "script-1"));
    assert!(created.iter().all(|c| c.webhook_url == "https://dialer.example/webhooks/call_status"));

    let record = h.store.get("call-2").await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Initiated);
    assert_eq!(record.lead_id, "lead-2");
    assert_eq!(record.phone_number, "+15550002");
    assert_eq!(record.campaign_id, "camp");
    assert_eq!(record.metadata["script_id"], "script-1");

    let updates = h.call_center.status_updates();
    assert_eq!(updates.len(), 3);
    assert!(updates.iter().all(|(_, s)| *s == LeadStatus::AiCallInProgress));
  }

  #[tokio::test]
  async fn stops_without_error_when_cap_reached() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(3)).await;
    seed_active(&h.store, "a").await;
    seed_active(&h.store, "b").await;

    let report = h.dispatcher.run_campaign("camp", "s", 2).await.unwrap();
    assert_eq!(report.available, 0);
    assert!(report.initiated.is_empty());
    assert!(h.call_center.lead_requests().is_empty());
    assert!(h.voice.created().is_empty());
  }

  #[tokio::test]
  async fn over_cap_active_count_does_not_underflow() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(1)).await;
    for id in ["a", "b", "c"] {
      seed_active(&h.store, id).await;
    }
    let report = h.dispatcher.run_campaign("camp", "s", 1).await.unwrap();
    assert_eq!(report.available, 0);
    assert!(h.voice.created().is_empty());
  }

  #[tokio::test]
  async fn terminal_calls_free_their_slots() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(2)).await;
    seed_active(&h.store, "done").await;
    h.store
      .update("done", CallUpdate::status(CallStatus::Completed))
      .await
      .unwrap();

    let report = h.dispatcher.run_campaign("camp", "s", 2).await.unwrap();
    assert_eq!(report.initiated.len(), 2);
  }

  #[tokio::test]
  async fn empty_lead_list_is_a_quiet_success() {
    let h = harness(FakeVoice::new(), FakeCallCenter::new()).await;
    let report = h.dispatcher.run_campaign("camp", "s", 3).await.unwrap();
    assert_eq!(report.leads, 0);
    assert!(report.initiated.is_empty());
    assert!(h.voice.created().is_empty());
  }

  #[tokio::test]
  async fn one_existing_call_and_five_leads_places_exactly_one() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(5).ignore_limit()).await;
    seed_active(&h.store, "existing").await;

    let report = h.dispatcher.run_campaign("camp", "s", 2).await.unwrap();
    assert_eq!(report.available, 1);
    assert_eq!(report.initiated, ["call-1"]);

    let created = h.voice.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].phone_number, "+15550001");

    assert_eq!(h.call_center.status_updates(), [(
      "lead-1".to_string(),
      LeadStatus::AiCallInProgress
    )]);
    assert_eq!(h.store.count_active(None).await.unwrap(), 2);

    let stats = h.store.campaign_stats("camp", StatsRange::default()).await.unwrap();
    assert_eq!(stats.total_calls, 2);
  }

  #[tokio::test]
  async fn failed_lead_does_not_abort_the_batch() {
    let voice = FakeVoice::new().fail_for("+15550002");
    let h = harness(voice, FakeCallCenter::with_leads(3)).await;

    let report = h.dispatcher.run_campaign("camp", "s", 10).await.unwrap();
    assert_eq!(report.leads, 3);
    assert_eq!(report.initiated.len(), 2);
    assert_eq!(report.failed, 1);

    let updated: Vec<_> = h.call_center.status_updates().into_iter().map(|(id, _)| id).collect();
    assert_eq!(updated, ["lead-1", "lead-3"]);
  }

  #[tokio::test]
  async fn unrecordable_call_is_ended() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(1)).await;
    // The fake hands out `call-1` next, so the insert collides.
    seed_active(&h.store, "call-1").await;

    let report = h.dispatcher.run_campaign("camp", "s", 5).await.unwrap();
    assert_eq!(report.leads, 1);
    assert!(report.initiated.is_empty());
    assert_eq!(report.failed, 1);
    assert_eq!(h.voice.ended(), ["call-1"]);
    assert!(h.call_center.status_updates().is_empty());

    let kept = h.store.get("call-1").await.unwrap().unwrap();
    assert_eq!(kept.lead_id, "old-call-1");
  }

  #[tokio::test]
  async fn lead_status_failure_keeps_the_call() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(2).fail_updates()).await;

    let report = h.dispatcher.run_campaign("camp", "s", 5).await.unwrap();
    assert_eq!(report.initiated.len(), 2);
    assert_eq!(report.failed, 0);
    assert!(h.store.get("call-1").await.unwrap().is_some());
    assert!(h.store.get("call-2").await.unwrap().is_some());
  }

  #[tokio::test]
  async fn lead_query_failure_is_reported() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(2).fail_leads()).await;
    let err = h.dispatcher.run_campaign("camp", "s", 5).await.unwrap_err();
    assert!(matches!(err, DispatchError::Leads { ref campaign_id, .. } if campaign_id == "camp"));
    assert!(h.voice.created().is_empty());
  }

  #[tokio::test]
  async fn concurrent_runs_share_the_cap() {
    let h = harness(FakeVoice::new(), FakeCallCenter::with_leads(10)).await;
    let dispatcher = Arc::new(h.dispatcher);

    let runs: Vec<_> = (0..4)
      .map(|_| {
        let d = dispatcher.clone();
        tokio::spawn(async move { d.run_campaign("camp", "s", 3).await.unwrap() })
      })
      .collect();
    let mut placed = 0;
    for run in runs {
      placed += run.await.unwrap().initiated.len();
    }

    assert_eq!(placed, 3);
    assert_eq!(h.store.count_active(None).await.unwrap(), 3);
  }
}
