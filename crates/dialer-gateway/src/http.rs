//! Request plumbing shared by both clients.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use crate::{CallCenterError, VoiceError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn build_client() -> reqwest::Result<Client> {
  Client::builder().timeout(REQUEST_TIMEOUT).build()
}

/// Why a request did not produce a successful body.
pub(crate) enum Failure {
  Status { status: u16, body: String },
  Transport(reqwest::Error),
}

/// Send `req` and return the response body of a 2xx response.
pub(crate) async fn send(req: RequestBuilder) -> Result<String, Failure> {
  let resp = req.send().await.map_err(Failure::Transport)?;
  let status = resp.status();
  let body = resp.text().await.map_err(Failure::Transport)?;
  if !status.is_success() {
    return Err(Failure::Status { status: status.as_u16(), body });
  }
  Ok(body)
}

impl Failure {
  pub(crate) fn into_voice(self, operation: &'static str) -> VoiceError {
    match self {
      Self::Status { status, body } => VoiceError::Provider { operation, status, body },
      Self::Transport(source) => VoiceError::Transport { operation, source },
    }
  }

  pub(crate) fn into_call_center(self, operation: &'static str) -> CallCenterError {
    match self {
      Self::Status { status, body } => CallCenterError::Gateway { operation, status, body },
      Self::Transport(source) => CallCenterError::Transport { operation, source },
    }
  }
}
