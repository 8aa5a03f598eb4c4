//! Call records, the unit of state the bridge manages.
//!
//! A record is created when the dispatcher places a call and is mutated only
//! by the webhook reconciler afterwards. Records are never deleted here.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Status ──────────────────────────────────────────────────────────────────

/// The lifecycle status of a call, as reported by the voice provider.
///
/// The provider owns this vocabulary, so unknown values are preserved in
/// [`CallStatus::Other`] instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallStatus {
  Initiated,
  InProgress,
  Completed,
  Ended,
  Failed,
  Other(String),
}

impl CallStatus {
  /// Statuses after which a record accepts no further updates.
  pub const TERMINAL: [CallStatus; 3] =
    [CallStatus::Completed, CallStatus::Ended, CallStatus::Failed];

  /// Statuses counted against a campaign's concurrency cap.
  pub const ACTIVE: [CallStatus; 2] = [CallStatus::Initiated, CallStatus::InProgress];

  pub fn as_str(&self) -> &str {
    match self {
      Self::Initiated => "initiated",
      Self::InProgress => "in-progress",
      Self::Completed => "completed",
      Self::Ended => "ended",
      Self::Failed => "failed",
      Self::Other(s) => s,
    }
  }

  /// No further provider-side activity is expected after a terminal status.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Self::Completed | Self::Ended | Self::Failed)
  }

  pub fn is_active(&self) -> bool {
    matches!(self, Self::Initiated | Self::InProgress)
  }
}

impl From<String> for CallStatus {
  fn from(s: String) -> Self {
    match s.as_str() {
      "initiated" => Self::Initiated,
      "in-progress" => Self::InProgress,
      "completed" => Self::Completed,
      "ended" => Self::Ended,
      "failed" => Self::Failed,
      _ => Self::Other(s),
    }
  }
}

impl From<&str> for CallStatus {
  fn from(s: &str) -> Self { Self::from(s.to_owned()) }
}

impl From<CallStatus> for String {
  fn from(status: CallStatus) -> Self {
    match status {
      CallStatus::Other(s) => s,
      known => known.as_str().to_owned(),
    }
  }
}

impl fmt::Display for CallStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A persisted call, keyed by the id the voice provider assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
  pub call_id:      String,
  /// Reference into the call-center platform's lead entity.
  pub lead_id:      String,
  pub phone_number: String,
  pub campaign_id:  String,
  pub status:       CallStatus,
  pub start_time:   DateTime<Utc>,
  /// Set on the first terminal transition and never rewritten.
  pub end_time:     Option<DateTime<Utc>>,
  pub metadata:     Map<String, Value>,
  pub transcript:   Option<String>,
  pub analytics:    Option<Value>,
}

impl CallRecord {
  /// Call length in seconds, once the call has ended.
  pub fn duration_secs(&self) -> Option<f64> {
    self
      .end_time
      .map(|end| (end - self.start_time).num_milliseconds() as f64 / 1000.0)
  }
}

/// Everything needed to persist a freshly placed call.
#[derive(Debug, Clone)]
pub struct NewCall {
  pub call_id:      String,
  pub lead_id:      String,
  pub phone_number: String,
  pub campaign_id:  String,
  pub start_time:   DateTime<Utc>,
  pub metadata:     Map<String, Value>,
}

impl NewCall {
  /// Build the initial record; every call starts out `initiated`.
  pub fn into_record(self) -> CallRecord {
    CallRecord {
      call_id:      self.call_id,
      lead_id:      self.lead_id,
      phone_number: self.phone_number,
      campaign_id:  self.campaign_id,
      status:       CallStatus::Initiated,
      start_time:   self.start_time,
      end_time:     None,
      metadata:     self.metadata,
      transcript:   None,
      analytics:    None,
    }
  }
}

// ─── Partial update ──────────────────────────────────────────────────────────

/// Fields to merge into an existing record. `None` leaves a field untouched.
///
/// `end_time`, `transcript` and `analytics` are write-once: the repository
/// ignores them when the stored value is already set. A record in a terminal
/// status accepts no update at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallUpdate {
  pub status:     Option<CallStatus>,
  pub end_time:   Option<DateTime<Utc>>,
  pub transcript: Option<String>,
  pub analytics:  Option<Value>,
  /// Replaces the whole metadata object.
  pub metadata:   Option<Map<String, Value>>,
}

impl CallUpdate {
  pub fn status(status: CallStatus) -> Self {
    Self { status: Some(status), ..Self::default() }
  }
}

/// What [`CallRepository::update`](crate::store::CallRepository::update) did.
#[derive(Debug, Clone, PartialEq)]
pub enum Updated {
  /// The update was merged; carries the new record.
  Applied(CallRecord),
  /// The record was already terminal and was left exactly as stored.
  Frozen(CallRecord),
}

impl Updated {
  pub fn record(&self) -> &CallRecord {
    match self {
      Self::Applied(r) | Self::Frozen(r) => r,
    }
  }

  pub fn into_record(self) -> CallRecord {
    match self {
      Self::Applied(r) | Self::Frozen(r) => r,
    }
  }

  pub fn is_applied(&self) -> bool { matches!(self, Self::Applied(_)) }
}
