//! Error types for `dialer-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("call not found: {0}")]
  NotFound(String),

  /// A record already exists for this provider call id. Provider ids are
  /// assumed unique, so this indicates a defect upstream.
  #[error("duplicate call id: {0}")]
  DuplicateKey(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
