//! Error types for `dialer-engine`.
//!
//! Only primary failures appear here. Secondary enrichment failures
//! (transcript and analytics fetches, lead-status pushes, single-lead
//! dispatch errors) are logged where they happen and never surface.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("failed to count active calls: {0}")]
  ActiveCount(#[source] BoxError),

  #[error("failed to fetch ready leads for campaign {campaign_id}: {source}")]
  Leads {
    campaign_id: String,
    #[source]
    source:      BoxError,
  },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
  #[error("call not found: {0}")]
  NotFound(String),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}
