//! SQL schema for the dialer's SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS calls (
    call_id       TEXT PRIMARY KEY,     -- assigned by the voice provider
    lead_id       TEXT NOT NULL,        -- call-center lead reference
    phone_number  TEXT NOT NULL,
    campaign_id   TEXT NOT NULL,
    status        TEXT NOT NULL,        -- provider vocabulary, open set
    start_time    TEXT NOT NULL,        -- fixed-width RFC 3339 UTC
    end_time      TEXT,                 -- write-once
    metadata      TEXT NOT NULL DEFAULT '{}',
    transcript    TEXT,                 -- write-once
    analytics     TEXT                  -- write-once JSON
);

CREATE INDEX IF NOT EXISTS calls_status_idx   ON calls(status);
CREATE INDEX IF NOT EXISTS calls_campaign_idx ON calls(campaign_id, start_time);

PRAGMA user_version = 1;
";
