//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width
//! and a `Z` suffix, so lexicographic order equals chronological order.
//! `metadata` and `analytics` are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use dialer_core::call::{CallRecord, CallStatus};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_metadata(metadata: &Map<String, Value>) -> Result<String> {
  Ok(serde_json::to_string(metadata)?)
}

pub fn decode_metadata(s: &str) -> Result<Map<String, Value>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_analytics(analytics: &Value) -> Result<String> {
  Ok(serde_json::to_string(analytics)?)
}

pub fn decode_analytics(s: &str) -> Result<Value> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawCall::from_row`].
pub const CALL_COLUMNS: &str = "call_id, lead_id, phone_number, campaign_id, status,
   start_time, end_time, metadata, transcript, analytics";

/// Raw strings read directly from a `calls` row.
pub struct RawCall {
  pub call_id:      String,
  pub lead_id:      String,
  pub phone_number: String,
  pub campaign_id:  String,
  pub status:       String,
  pub start_time:   String,
  pub end_time:     Option<String>,
  pub metadata:     String,
  pub transcript:   Option<String>,
  pub analytics:    Option<String>,
}

impl RawCall {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      call_id:      row.get(0)?,
      lead_id:      row.get(1)?,
      phone_number: row.get(2)?,
      campaign_id:  row.get(3)?,
      status:       row.get(4)?,
      start_time:   row.get(5)?,
      end_time:     row.get(6)?,
      metadata:     row.get(7)?,
      transcript:   row.get(8)?,
      analytics:    row.get(9)?,
    })
  }

  pub fn into_record(self) -> Result<CallRecord> {
    Ok(CallRecord {
      call_id:      self.call_id,
      lead_id:      self.lead_id,
      phone_number: self.phone_number,
      campaign_id:  self.campaign_id,
      status:       CallStatus::from(self.status),
      start_time:   decode_dt(&self.start_time)?,
      end_time:     self.end_time.as_deref().map(decode_dt).transpose()?,
      metadata:     decode_metadata(&self.metadata)?,
      transcript:   self.transcript,
      analytics:    self.analytics.as_deref().map(decode_analytics).transpose()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn encoded_timestamps_sort_chronologically() {
    let whole = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let later = whole + chrono::Duration::milliseconds(500);
    assert!(encode_dt(whole) < encode_dt(later));
    assert_eq!(encode_dt(whole), "2024-05-01T12:00:00.000000Z");
  }

  #[test]
  fn timestamps_decode_back() {
    let dt = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
    assert_eq!(decode_dt(&encode_dt(dt)).unwrap(), dt);
    assert!(decode_dt("yesterday").is_err());
  }
}
