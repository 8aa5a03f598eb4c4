//! Webhook reconciliation: apply provider call-status events to stored
//! records and reflect final outcomes onto call-center leads.
//!
//! Status transitions only move forward: once a record is terminal its
//! status, end time, transcript and analytics stay as first recorded.

use std::sync::Arc;

use chrono::Utc;
use dialer_core::{
  call::{CallRecord, CallStatus, CallUpdate, Updated},
  campaign::LeadStatus,
  gateway::{CallCenter, VoiceProvider},
  store::CallRepository,
};
use serde_json::Value;

use crate::error::ReconcileError;

/// Metadata key holding the payload of the last applied event.
pub const LAST_EVENT_KEY: &str = "last_event";

/// How an event affected the stored record.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
  /// The event was written; carries the updated record.
  Applied(CallRecord),
  /// A repeated terminal event for an already-terminal call. Nothing was
  /// written; the lead disposition was pushed again.
  Duplicate(CallRecord),
  /// A non-terminal event arriving after the call had already ended.
  Ignored(CallRecord),
}

impl ReconcileOutcome {
  pub fn record(&self) -> &CallRecord {
    match self {
      Self::Applied(r) | Self::Duplicate(r) | Self::Ignored(r) => r,
    }
  }
}

/// Applies call-status events from the voice provider.
pub struct Reconciler<R, V, C> {
  store:       Arc<R>,
  voice:       Arc<V>,
  call_center: Arc<C>,
}

impl<R, V, C> Reconciler<R, V, C>
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  pub fn new(store: Arc<R>, voice: Arc<V>, call_center: Arc<C>) -> Self {
    Self { store, voice, call_center }
  }

  /// Apply one status event.
  ///
  /// Unknown calls are rejected with [`ReconcileError::NotFound`]. For a
  /// terminal status the transcript and analytics are fetched before the
  /// write and the lead disposition is pushed after it; failures there are
  /// logged and the status change is stored regardless.
  ///
  /// The early terminal check only saves provider round trips. The store
  /// re-checks atomically, so an event racing a terminal write still ends up
  /// [`ReconcileOutcome::Ignored`] or [`ReconcileOutcome::Duplicate`].
  #[tracing::instrument(skip(self, status, raw_payload), fields(status = %status))]
  pub async fn handle_status_event(
    &self,
    call_id: &str,
    status: CallStatus,
    raw_payload: Value,
  ) -> Result<ReconcileOutcome, ReconcileError> {
    let record = self
      .store
      .get(call_id)
      .await
      .map_err(|e| ReconcileError::Store(Box::new(e)))?
      .ok_or_else(|| {
        tracing::warn!("status event for unknown call");
        ReconcileError::NotFound(call_id.to_owned())
      })?;

    tracing::info!(current = %record.status, "received status update");

    if record.status.is_terminal() {
      return Ok(self.settled(record, &status).await);
    }

    let mut metadata = record.metadata.clone();
    metadata.insert(LAST_EVENT_KEY.into(), raw_payload);

    let mut update = CallUpdate {
      status: Some(status.clone()),
      metadata: Some(metadata),
      ..CallUpdate::default()
    };

    if status.is_terminal() {
      update.end_time = Some(Utc::now());

      match self.voice.get_transcript(call_id).await {
        Ok(transcript) => update.transcript = transcript,
        Err(e) => tracing::warn!(error = %e, "failed to fetch transcript"),
      }
      match self.voice.get_analytics(call_id).await {
        Ok(analytics) => update.analytics = Some(analytics),
        Err(e) => tracing::warn!(error = %e, "failed to fetch analytics"),
      }
    }

    let written = self
      .store
      .update(call_id, update)
      .await
      .map_err(|e| ReconcileError::Store(Box::new(e)))?;

    match written {
      Updated::Applied(updated) => {
        self.push_disposition(&updated.lead_id, &updated.status).await;
        Ok(ReconcileOutcome::Applied(updated))
      }
      Updated::Frozen(current) => {
        tracing::debug!(current = %current.status, "call finished while the event was in flight");
        Ok(self.settled(current, &status).await)
      }
    }
  }

  /// Outcome for an event aimed at a record that is already terminal.
  async fn settled(&self, record: CallRecord, status: &CallStatus) -> ReconcileOutcome {
    if status.is_terminal() {
      tracing::debug!("duplicate terminal event");
      self.push_disposition(&record.lead_id, &record.status).await;
      return ReconcileOutcome::Duplicate(record);
    }
    tracing::warn!(current = %record.status, "ignoring status regression after terminal state");
    ReconcileOutcome::Ignored(record)
  }

  /// Best-effort write of the lead disposition for a terminal status.
  async fn push_disposition(&self, lead_id: &str, status: &CallStatus) {
    let Some(disposition) = LeadStatus::for_terminal(status) else {
      return;
    };
    if let Err(e) = self.call_center.update_lead_status(lead_id, disposition).await {
      tracing::error!(lead_id, disposition = disposition.code(), error = %e, "failed to update lead status");
    }
  }
}
