//! AI voice provider client.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | create call | `POST /calls` |
//! | status | `GET /calls/{id}` |
//! | end call | `POST /calls/{id}/end` |
//! | transcript | `GET /calls/{id}/transcript` |
//! | analytics | `GET /calls/{id}/analytics` |
//!
//! The supported services share these routes and differ only in their base
//! URL and the field names of the create-call body. Call ids are
//! percent-encoded as a single path segment.

use dialer_core::gateway::{ProviderCall, VoiceProvider};
use reqwest::{Client, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
  error::VoiceError,
  http::{build_client, send},
};

// ─── Service variants ────────────────────────────────────────────────────────

/// The AI voice services this client can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceService {
  #[default]
  Retell,
  Vapi,
}

impl VoiceService {
  /// Resolve a configured service name. Anything other than `retell` selects
  /// Vapi.
  pub fn from_name(name: &str) -> Self {
    if name.trim().eq_ignore_ascii_case("retell") { Self::Retell } else { Self::Vapi }
  }

  pub fn default_base_url(self) -> &'static str {
    match self {
      Self::Retell => "https://api.retellai.com/v1",
      Self::Vapi => "https://api.vapi.ai/v1",
    }
  }

  fn create_call_body(self, phone_number: &str, script_id: &str, webhook_url: &str) -> Value {
    match self {
      Self::Retell => json!({
        "to":          phone_number,
        "script_id":   script_id,
        "webhook_url": webhook_url,
      }),
      Self::Vapi => json!({
        "phone_number": phone_number,
        "assistant_id": script_id,
        "webhook_url":  webhook_url,
      }),
    }
  }
}

// ─── Response bodies ─────────────────────────────────────────────────────────

/// Services name the new call's id `id` or `call_id`; some send both.
#[derive(Deserialize)]
struct CreatedCall {
  #[serde(default)]
  id:      Option<String>,
  #[serde(default)]
  call_id: Option<String>,
}

impl CreatedCall {
  fn into_id(self) -> Result<String, serde_json::Error> {
    self
      .id
      .or(self.call_id)
      .ok_or_else(|| <serde_json::Error as serde::de::Error>::missing_field("id"))
  }
}

#[derive(Deserialize)]
struct Transcript {
  #[serde(default)]
  text: Option<String>,
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Async client for the configured AI voice service.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct VoiceClient {
  client:   Client,
  service:  VoiceService,
  base_url: String,
  api_key:  String,
}

impl VoiceClient {
  pub fn new(service: VoiceService, api_key: impl Into<String>) -> Result<Self, VoiceError> {
    Ok(Self {
      client: build_client().map_err(VoiceError::Client)?,
      service,
      base_url: service.default_base_url().to_owned(),
      api_key: api_key.into(),
    })
  }

  /// Point the client at a different API root (staging, a mock server).
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  pub fn service(&self) -> VoiceService { self.service }

  /// `{base}/calls`, then `call_id` and `action` as escaped segments.
  fn calls_url(&self, call_id: Option<&str>, action: Option<&str>) -> Result<Url, VoiceError> {
    if let Some(id) = call_id
      && matches!(id, "" | "." | "..")
    {
      return Err(VoiceError::InvalidCallId(id.to_owned()));
    }

    let invalid_base = || VoiceError::BaseUrl(self.base_url.clone());
    let mut url = Url::parse(&self.base_url).map_err(|_| invalid_base())?;
    url
      .path_segments_mut()
      .map_err(|()| invalid_base())?
      .pop_if_empty()
      .push("calls")
      .extend(call_id)
      .extend(action);
    Ok(url)
  }

  async fn request(
    &self,
    operation: &'static str,
    req: reqwest::RequestBuilder,
  ) -> Result<String, VoiceError> {
    tracing::debug!(operation, service = ?self.service, "voice provider request");
    send(req.bearer_auth(&self.api_key))
      .await
      .map_err(|f| f.into_voice(operation))
  }

  fn decode<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, VoiceError> {
    serde_json::from_str(body).map_err(|source| VoiceError::Decode { operation, source })
  }
}

impl VoiceProvider for VoiceClient {
  type Error = VoiceError;

  async fn create_call(
    &self,
    phone_number: &str,
    script_id: &str,
    webhook_url: &str,
  ) -> Result<String, VoiceError> {
    let body = self.service.create_call_body(phone_number, script_id, webhook_url);
    let url = self.calls_url(None, None)?;
    let resp = self.request("create_call", self.client.post(url).json(&body)).await?;
    let created: CreatedCall = Self::decode("create_call", &resp)?;
    created
      .into_id()
      .map_err(|source| VoiceError::Decode { operation: "create_call", source })
  }

  async fn get_status(&self, call_id: &str) -> Result<ProviderCall, VoiceError> {
    let url = self.calls_url(Some(call_id), None)?;
    let resp = self.request("get_status", self.client.get(url)).await?;
    Self::decode("get_status", &resp)
  }

  async fn end_call(&self, call_id: &str) -> Result<(), VoiceError> {
    let url = self.calls_url(Some(call_id), Some("end"))?;
    self.request("end_call", self.client.post(url)).await?;
    Ok(())
  }

  async fn get_transcript(&self, call_id: &str) -> Result<Option<String>, VoiceError> {
    let url = self.calls_url(Some(call_id), Some("transcript"))?;
    let resp = self.request("get_transcript", self.client.get(url)).await?;
    let transcript: Transcript = Self::decode("get_transcript", &resp)?;
    Ok(transcript.text)
  }

  async fn get_analytics(&self, call_id: &str) -> Result<Value, VoiceError> {
    let url = self.calls_url(Some(call_id), Some("analytics"))?;
    let resp = self.request("get_analytics", self.client.get(url)).await?;
    Self::decode("get_analytics", &resp)
  }
}
