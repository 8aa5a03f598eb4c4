//! Campaign-side types: leads pulled from the call center, the lead
//! dispositions written back to it, and aggregate statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::call::CallStatus;

// ─── Leads ───────────────────────────────────────────────────────────────────

/// A dialable contact owned by the call-center platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
  pub lead_id:      String,
  pub phone_number: String,
}

/// Disposition codes this bridge writes onto call-center leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadStatus {
  /// The AI call has been placed and is not finished yet.
  #[serde(rename = "AICALL")]
  AiCallInProgress,
  #[serde(rename = "AICOMPL")]
  AiCompleted,
  /// Every terminal outcome other than `completed`.
  #[serde(rename = "AINOANS")]
  AiNoAnswer,
}

impl LeadStatus {
  pub fn code(self) -> &'static str {
    match self {
      Self::AiCallInProgress => "AICALL",
      Self::AiCompleted => "AICOMPL",
      Self::AiNoAnswer => "AINOANS",
    }
  }

  /// Disposition for a terminal call status; `None` for non-terminal ones.
  pub fn for_terminal(status: &CallStatus) -> Option<Self> {
    match status {
      CallStatus::Completed => Some(Self::AiCompleted),
      s if s.is_terminal() => Some(Self::AiNoAnswer),
      _ => None,
    }
  }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Inclusive bounds on `start_time` for [`CampaignStats`] queries.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StatsRange {
  pub from: Option<DateTime<Utc>>,
  pub to:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStats {
  pub total_calls:     u64,
  pub completed_calls: u64,
  /// Mean of `end_time - start_time` over completed calls, in seconds.
  pub avg_duration:    Option<f64>,
}
