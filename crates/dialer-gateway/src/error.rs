//! Error types for `dialer-gateway`.

use thiserror::Error;

/// A failure talking to the AI voice provider.
#[derive(Debug, Error)]
pub enum VoiceError {
  #[error("voice provider {operation} returned HTTP {status}: {body}")]
  Provider {
    operation: &'static str,
    status:    u16,
    body:      String,
  },

  #[error("voice provider {operation} request failed: {source}")]
  Transport {
    operation: &'static str,
    #[source]
    source:    reqwest::Error,
  },

  #[error("voice provider {operation} returned an unreadable body: {source}")]
  Decode {
    operation: &'static str,
    #[source]
    source:    serde_json::Error,
  },

  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("invalid voice provider base URL: {0}")]
  BaseUrl(String),

  #[error("invalid call id: {0:?}")]
  InvalidCallId(String),
}

/// A failure talking to the call-center platform.
#[derive(Debug, Error)]
pub enum CallCenterError {
  #[error("call center {operation} returned HTTP {status}: {body}")]
  Gateway {
    operation: &'static str,
    status:    u16,
    body:      String,
  },

  #[error("call center {operation} request failed: {source}")]
  Transport {
    operation: &'static str,
    #[source]
    source:    reqwest::Error,
  },

  #[error("call center {operation} returned an unreadable body: {source}")]
  Decode {
    operation: &'static str,
    #[source]
    source:    serde_json::Error,
  },

  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),
}
