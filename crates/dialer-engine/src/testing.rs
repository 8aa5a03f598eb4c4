//! Recording test doubles for [`VoiceProvider`] and [`CallCenter`].
//!
//! Both fakes keep every request they receive so tests can assert on the
//! exact external traffic an operation produced.

use std::{
  collections::HashSet,
  sync::{Mutex, MutexGuard},
};

use dialer_core::{
  campaign::{Lead, LeadStatus},
  gateway::{CallCenter, ProviderCall, VoiceProvider},
};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("fake failure: {0}")]
pub struct FakeError(pub String);

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ─── Voice provider ──────────────────────────────────────────────────────────

/// One `create_call` request as the fake received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequest {
  pub phone_number: String,
  pub script_id:    String,
  pub webhook_url:  String,
}

#[derive(Default)]
struct VoiceState {
  next_id:         u32,
  created:         Vec<CreateRequest>,
  ended:           Vec<String>,
  artifact_calls:  usize,
  failing_numbers: HashSet<String>,
  fail_artifacts:  bool,
}

/// A voice provider that hands out sequential ids (`call-1`, `call-2`, ...).
#[derive(Default)]
pub struct FakeVoice {
  state: Mutex<VoiceState>,
}

impl FakeVoice {
  pub fn new() -> Self { Self::default() }

  /// Make `create_call` fail for this phone number.
  pub fn fail_for(self, phone_number: &str) -> Self {
    locked(&self.state).failing_numbers.insert(phone_number.to_owned());
    self
  }

  /// Make transcript and analytics fetches fail.
  pub fn fail_artifacts(self) -> Self {
    locked(&self.state).fail_artifacts = true;
    self
  }

  pub fn created(&self) -> Vec<CreateRequest> { locked(&self.state).created.clone() }

  pub fn ended(&self) -> Vec<String> { locked(&self.state).ended.clone() }

  /// Number of transcript plus analytics requests received.
  pub fn artifact_calls(&self) -> usize { locked(&self.state).artifact_calls }
}

impl VoiceProvider for FakeVoice {
  type Error = FakeError;

  async fn create_call(
    &self,
    phone_number: &str,
    script_id: &str,
    webhook_url: &str,
  ) -> Result<String, FakeError> {
    let mut state = locked(&self.state);
    if state.failing_numbers.contains(phone_number) {
      return Err(FakeError(format!("cannot dial {phone_number}")));
    }
    state.next_id += 1;
    state.created.push(CreateRequest {
      phone_number: phone_number.to_owned(),
      script_id:    script_id.to_owned(),
      webhook_url:  webhook_url.to_owned(),
    });
    Ok(format!("call-{}", state.next_id))
  }

  async fn get_status(&self, call_id: &str) -> Result<ProviderCall, FakeError> {
    Ok(ProviderCall {
      id:     Some(call_id.to_owned()),
      status: None,
      extra:  Default::default(),
    })
  }

  async fn end_call(&self, call_id: &str) -> Result<(), FakeError> {
    locked(&self.state).ended.push(call_id.to_owned());
    Ok(())
  }

  async fn get_transcript(&self, call_id: &str) -> Result<Option<String>, FakeError> {
    let mut state = locked(&self.state);
    state.artifact_calls += 1;
    if state.fail_artifacts {
      return Err(FakeError("transcript unavailable".into()));
    }
    Ok(Some(format!("transcript of {call_id}")))
  }

  async fn get_analytics(&self, call_id: &str) -> Result<Value, FakeError> {
    let mut state = locked(&self.state);
    state.artifact_calls += 1;
    if state.fail_artifacts {
      return Err(FakeError("analytics unavailable".into()));
    }
    Ok(json!({ "call_id": call_id, "sentiment": "positive" }))
  }
}

// ─── Call center ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct CallCenterState {
  leads:          Vec<Lead>,
  ignore_limit:   bool,
  fail_leads:     bool,
  fail_updates:   bool,
  lead_requests:  Vec<(String, usize)>,
  status_updates: Vec<(String, LeadStatus)>,
}

/// A call center serving a fixed list of ready leads.
#[derive(Default)]
pub struct FakeCallCenter {
  state: Mutex<CallCenterState>,
}

impl FakeCallCenter {
  pub fn new() -> Self { Self::default() }

  /// Serve leads `lead-1..=lead-n` with phone numbers `+1555000<i>`.
  pub fn with_leads(n: usize) -> Self {
    let fake = Self::default();
    locked(&fake.state).leads = (1..=n)
      .map(|i| Lead { lead_id: format!("lead-{i}"), phone_number: format!("+1555000{i}") })
      .collect();
    fake
  }

  /// Return every lead regardless of the requested limit.
  pub fn ignore_limit(self) -> Self {
    locked(&self.state).ignore_limit = true;
    self
  }

  pub fn fail_leads(self) -> Self {
    locked(&self.state).fail_leads = true;
    self
  }

  pub fn fail_updates(self) -> Self {
    locked(&self.state).fail_updates = true;
    self
  }

  /// `(campaign_id, limit)` of every lead request.
  pub fn lead_requests(&self) -> Vec<(String, usize)> { locked(&self.state).lead_requests.clone() }

  /// Every attempted status update, including failed ones.
  pub fn status_updates(&self) -> Vec<(String, LeadStatus)> {
    locked(&self.state).status_updates.clone()
  }
}

impl CallCenter for FakeCallCenter {
  type Error = FakeError;

  async fn get_ready_leads(&self, campaign_id: &str, limit: usize) -> Result<Vec<Lead>, FakeError> {
    let mut state = locked(&self.state);
    state.lead_requests.push((campaign_id.to_owned(), limit));
    if state.fail_leads {
      return Err(FakeError("lead query failed".into()));
    }
    let take = if state.ignore_limit { state.leads.len() } else { limit };
    Ok(state.leads.iter().take(take).cloned().collect())
  }

  async fn update_lead_status(&self, lead_id: &str, status: LeadStatus) -> Result<(), FakeError> {
    let mut state = locked(&self.state);
    state.status_updates.push((lead_id.to_owned(), status));
    if state.fail_updates {
      return Err(FakeError(format!("cannot update {lead_id}")));
    }
    Ok(())
  }
}
