//! Traits for the two external systems the bridge talks to.
//!
//! Implementations report every failure to the caller; retrying is the
//! caller's decision.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  call::CallStatus,
  campaign::{Lead, LeadStatus},
};

// ─── Voice provider ──────────────────────────────────────────────────────────

/// A provider's live view of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCall {
  #[serde(default, alias = "call_id")]
  pub id:     Option<String>,
  #[serde(default)]
  pub status: Option<CallStatus>,
  /// Provider-specific fields, passed through untouched.
  #[serde(flatten)]
  pub extra:  Map<String, Value>,
}

/// The AI voice service that places and runs calls.
pub trait VoiceProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Place an outbound call and return the provider-assigned call id.
  fn create_call<'a>(
    &'a self,
    phone_number: &'a str,
    script_id: &'a str,
    webhook_url: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  fn get_status<'a>(
    &'a self,
    call_id: &'a str,
  ) -> impl Future<Output = Result<ProviderCall, Self::Error>> + Send + 'a;

  fn end_call<'a>(
    &'a self,
    call_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Transcript text of a finished call; `None` when the provider has none.
  fn get_transcript<'a>(
    &'a self,
    call_id: &'a str,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;

  fn get_analytics<'a>(
    &'a self,
    call_id: &'a str,
  ) -> impl Future<Output = Result<Value, Self::Error>> + Send + 'a;
}

// ─── Call center ─────────────────────────────────────────────────────────────

/// The call-center platform that owns leads and their dispositions.
pub trait CallCenter: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// At most `limit` leads currently in a dialable stage. An empty result is
  /// not an error.
  fn get_ready_leads<'a>(
    &'a self,
    campaign_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Lead>, Self::Error>> + Send + 'a;

  /// Write a disposition onto a lead. Idempotent on the platform side.
  fn update_lead_status<'a>(
    &'a self,
    lead_id: &'a str,
    status: LeadStatus,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
