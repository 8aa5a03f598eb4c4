//! The `CallRepository` trait.
//!
//! The trait is implemented by storage backends (e.g. `dialer-store-sqlite`).
//! The engine and the HTTP layer depend on this abstraction, not on any
//! concrete backend. It carries no business rules beyond the write-once
//! fields documented on [`CallUpdate`] and the terminal freeze on
//! [`CallRepository::update`].

use std::future::Future;

use crate::{
  call::{CallRecord, CallUpdate, NewCall, Updated},
  campaign::{CampaignStats, StatsRange},
};

/// Abstraction over call-record persistence.
///
/// Each method is atomic on its own; nothing spans several calls.
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait CallRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert a new record with status `initiated`.
  ///
  /// Fails with a duplicate-key error if `call_id` is already stored.
  fn create(
    &self,
    call: NewCall,
  ) -> impl Future<Output = Result<CallRecord, Self::Error>> + Send + '_;

  /// Retrieve a record by provider call id. Returns `None` if not found.
  fn get<'a>(
    &'a self,
    call_id: &'a str,
  ) -> impl Future<Output = Result<Option<CallRecord>, Self::Error>> + Send + 'a;

  /// Merge `update` into an existing record and return the result.
  ///
  /// The terminal check and the write are one atomic step: a record already
  /// in a terminal status is returned unchanged as [`Updated::Frozen`].
  /// Fails with a not-found error if the record does not exist.
  fn update<'a>(
    &'a self,
    call_id: &'a str,
    update: CallUpdate,
  ) -> impl Future<Output = Result<Updated, Self::Error>> + Send + 'a;

  /// Count records in a non-terminal status (`initiated`, `in-progress`),
  /// optionally restricted to one campaign.
  fn count_active<'a>(
    &'a self,
    campaign_id: Option<&'a str>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Aggregate totals for a campaign over an optional `start_time` range.
  fn campaign_stats<'a>(
    &'a self,
    campaign_id: &'a str,
    range: StatsRange,
  ) -> impl Future<Output = Result<CampaignStats, Self::Error>> + Send + 'a;

  /// The most recently started records of a campaign, newest first.
  fn list_campaign_calls<'a>(
    &'a self,
    campaign_id: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<CallRecord>, Self::Error>> + Send + 'a;
}
