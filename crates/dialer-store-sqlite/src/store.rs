//! [`SqliteCallStore`]: the SQLite implementation of [`CallRepository`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use dialer_core::{
  call::{CallRecord, CallStatus, CallUpdate, NewCall, Updated},
  campaign::{CampaignStats, StatsRange},
  store::CallRepository,
};

use crate::{
  encode::{decode_dt, encode_analytics, encode_dt, encode_metadata, RawCall, CALL_COLUMNS},
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Call records backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteCallStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteCallStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

/// Encoded `start_time` bounds, shared by the statistics queries.
fn encode_range(range: StatsRange) -> (Option<String>, Option<String>) {
  (range.from.map(encode_dt), range.to.map(encode_dt))
}

// ─── CallRepository impl ─────────────────────────────────────────────────────

impl CallRepository for SqliteCallStore {
  type Error = Error;

  async fn create(&self, call: NewCall) -> Result<CallRecord> {
    let record = call.into_record();

    let call_id      = record.call_id.clone();
    let lead_id      = record.lead_id.clone();
    let phone_number = record.phone_number.clone();
    let campaign_id  = record.campaign_id.clone();
    let status       = record.status.as_str().to_owned();
    let start_time   = encode_dt(record.start_time);
    let metadata     = encode_metadata(&record.metadata)?;

    let inserted = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO calls (
             call_id, lead_id, phone_number, campaign_id, status, start_time, metadata
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            call_id,
            lead_id,
            phone_number,
            campaign_id,
            status,
            start_time,
            metadata,
          ],
        );
        match result {
          Ok(_) => Ok(true),
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(dialer_core::Error::DuplicateKey(record.call_id).into());
    }
    Ok(record)
  }

  async fn get(&self, call_id: &str) -> Result<Option<CallRecord>> {
    let id = call_id.to_owned();

    let raw: Option<RawCall> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1"),
            rusqlite::params![id],
            RawCall::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawCall::into_record).transpose()
  }

  async fn update(&self, call_id: &str, update: CallUpdate) -> Result<Updated> {
    let id         = call_id.to_owned();
    let status     = update.status.map(String::from);
    let end_time   = update.end_time.map(encode_dt);
    let transcript = update.transcript;
    let analytics  = update.analytics.as_ref().map(encode_analytics).transpose()?;
    let metadata   = update.metadata.as_ref().map(encode_metadata).transpose()?;
    let [completed, ended, failed] = CallStatus::TERMINAL.map(String::from);

    let raw: Option<(bool, RawCall)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Terminal rows are frozen; end_time, transcript and analytics keep
        // their first value.
        let changed = tx.execute(
          "UPDATE calls SET
             status     = COALESCE(?2, status),
             end_time   = COALESCE(end_time, ?3),
             transcript = COALESCE(transcript, ?4),
             analytics  = COALESCE(analytics, ?5),
             metadata   = COALESCE(?6, metadata)
           WHERE call_id = ?1
             AND status NOT IN (?7, ?8, ?9)",
          rusqlite::params![
            id, status, end_time, transcript, analytics, metadata, completed, ended, failed,
          ],
        )?;
        let raw = tx
          .query_row(
            &format!("SELECT {CALL_COLUMNS} FROM calls WHERE call_id = ?1"),
            rusqlite::params![id],
            RawCall::from_row,
          )
          .optional()?;
        tx.commit()?;
        Ok(raw.map(|raw| (changed > 0, raw)))
      })
      .await?;

    let (applied, raw) =
      raw.ok_or_else(|| Error::Core(dialer_core::Error::NotFound(call_id.to_owned())))?;
    let record = raw.into_record()?;
    Ok(if applied { Updated::Applied(record) } else { Updated::Frozen(record) })
  }

  async fn count_active(&self, campaign_id: Option<&str>) -> Result<u64> {
    let [initiated, in_progress] = CallStatus::ACTIVE.map(String::from);
    let campaign = campaign_id.map(str::to_owned);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM calls
           WHERE status IN (?1, ?2)
             AND (?3 IS NULL OR campaign_id = ?3)",
          rusqlite::params![initiated, in_progress, campaign],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(count as u64)
  }

  async fn campaign_stats(&self, campaign_id: &str, range: StatsRange) -> Result<CampaignStats> {
    let campaign   = campaign_id.to_owned();
    let completed  = CallStatus::Completed.as_str().to_owned();
    let (from, to) = encode_range(range);

    let ((total, completed_calls), spans): ((i64, i64), Vec<(String, String)>) = self
      .conn
      .call(move |conn| {
        let counts: (i64, i64) = conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(CASE WHEN status = ?2 THEN 1 ELSE 0 END), 0)
           FROM calls
           WHERE campaign_id = ?1
             AND (?3 IS NULL OR start_time >= ?3)
             AND (?4 IS NULL OR start_time <= ?4)",
          rusqlite::params![campaign, completed, from, to],
          |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        let mut stmt = conn.prepare(
          "SELECT start_time, end_time
           FROM calls
           WHERE campaign_id = ?1
             AND status = ?2
             AND end_time IS NOT NULL
             AND (?3 IS NULL OR start_time >= ?3)
             AND (?4 IS NULL OR start_time <= ?4)",
        )?;
        let spans: Vec<(String, String)> = stmt
          .query_map(rusqlite::params![campaign, completed, from, to], |r| {
            Ok((r.get(0)?, r.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((counts, spans))
      })
      .await?;

    let durations = spans
      .iter()
      .map(|(start, end)| {
        let elapsed = decode_dt(end)? - decode_dt(start)?;
        Ok(elapsed.num_milliseconds() as f64 / 1000.0)
      })
      .collect::<Result<Vec<f64>>>()?;

    let avg_duration = (!durations.is_empty())
      .then(|| durations.iter().sum::<f64>() / durations.len() as f64);

    Ok(CampaignStats {
      total_calls: total as u64,
      completed_calls: completed_calls as u64,
      avg_duration,
    })
  }

  async fn list_campaign_calls(&self, campaign_id: &str, limit: usize) -> Result<Vec<CallRecord>> {
    let campaign  = campaign_id.to_owned();
    let limit_val = limit as i64;

    let raws: Vec<RawCall> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CALL_COLUMNS} FROM calls
           WHERE campaign_id = ?1
           ORDER BY start_time DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![campaign, limit_val], RawCall::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCall::into_record).collect()
  }
}
