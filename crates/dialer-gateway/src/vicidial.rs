//! Call-center client for the ViciDial agent API (`/agc/api.php`).
//!
//! Every call goes to the same endpoint; the `function` parameter selects the
//! operation and credentials travel as `user`/`pass` parameters.

use dialer_core::{
  campaign::{Lead, LeadStatus},
  gateway::CallCenter,
};
use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::{
  error::CallCenterError,
  http::{build_client, send},
};

/// A lead row as the API returns it. Ids and numbers may arrive as JSON
/// strings or numbers depending on the server's configuration.
#[derive(Deserialize)]
struct RawLead {
  #[serde(deserialize_with = "string_or_number")]
  lead_id:      String,
  #[serde(deserialize_with = "string_or_number")]
  phone_number: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Scalar {
    Text(String),
    Int(i64),
    Uint(u64),
  }

  Ok(match Scalar::deserialize(deserializer)? {
    Scalar::Text(s) => s,
    Scalar::Int(n) => n.to_string(),
    Scalar::Uint(n) => n.to_string(),
  })
}

/// Async client for the call-center agent API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct VicidialClient {
  client:   Client,
  endpoint: String,
  user:     String,
  pass:     String,
}

impl VicidialClient {
  pub fn new(
    base_url: &str,
    user: impl Into<String>,
    pass: impl Into<String>,
  ) -> Result<Self, CallCenterError> {
    Ok(Self {
      client:   build_client().map_err(CallCenterError::Client)?,
      endpoint: format!("{}/agc/api.php", base_url.trim_end_matches('/')),
      user:     user.into(),
      pass:     pass.into(),
    })
  }

  fn credentials(&self) -> [(&'static str, &str); 2] {
    [("user", self.user.as_str()), ("pass", self.pass.as_str())]
  }
}

impl CallCenter for VicidialClient {
  type Error = CallCenterError;

  async fn get_ready_leads(
    &self,
    campaign_id: &str,
    limit: usize,
  ) -> Result<Vec<Lead>, CallCenterError> {
    const OPERATION: &str = "get_leads";
    if limit == 0 {
      return Ok(Vec::new());
    }

    let limit_str = limit.to_string();
    let req = self
      .client
      .get(&self.endpoint)
      .query(&self.credentials())
      .query(&[
        ("function", OPERATION),
        ("campaign_id", campaign_id),
        ("limit", limit_str.as_str()),
        ("stage", "ready"),
        ("format", "json"),
      ]);

    tracing::debug!(campaign_id, limit, "fetching ready leads");
    let body = send(req).await.map_err(|f| f.into_call_center(OPERATION))?;
    let raws: Vec<RawLead> = serde_json::from_str(&body)
      .map_err(|source| CallCenterError::Decode { operation: OPERATION, source })?;

    Ok(
      raws
        .into_iter()
        .take(limit)
        .map(|r| Lead { lead_id: r.lead_id, phone_number: r.phone_number })
        .collect(),
    )
  }

  async fn update_lead_status(
    &self,
    lead_id: &str,
    status: LeadStatus,
  ) -> Result<(), CallCenterError> {
    const OPERATION: &str = "update_lead";
    let [user, pass] = self.credentials();
    let form = [
      user,
      pass,
      ("function", OPERATION),
      ("lead_id", lead_id),
      ("status", status.code()),
      ("format", "json"),
    ];

    tracing::debug!(lead_id, status = status.code(), "updating lead status");
    send(self.client.post(&self.endpoint).form(&form))
      .await
      .map_err(|f| f.into_call_center(OPERATION))?;
    Ok(())
  }
}
