//! Periodic campaign dispatch.
//!
//! Each configured [`CampaignSchedule`] gets its own tokio task that runs a
//! dispatch pass on every tick. Failures are logged and the task keeps going.

use std::{sync::Arc, time::Duration};

use dialer_core::{
  gateway::{CallCenter, VoiceProvider},
  store::CallRepository,
};
use dialer_engine::Dispatcher;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::CampaignSchedule;

/// Spawn one dispatch loop per schedule. The first pass runs immediately.
pub fn spawn<R, V, C>(
  dispatcher: Arc<Dispatcher<R, V, C>>,
  schedules: &[CampaignSchedule],
) -> Vec<JoinHandle<()>>
where
  R: CallRepository + 'static,
  V: VoiceProvider + 'static,
  C: CallCenter + 'static,
{
  schedules
    .iter()
    .cloned()
    .map(|schedule| tokio::spawn(run(dispatcher.clone(), schedule)))
    .collect()
}

async fn run<R, V, C>(dispatcher: Arc<Dispatcher<R, V, C>>, schedule: CampaignSchedule)
where
  R: CallRepository,
  V: VoiceProvider,
  C: CallCenter,
{
  let period = Duration::from_secs(schedule.interval_secs.max(1));
  let mut interval = tokio::time::interval(period);
  // A slow pass must not trigger a burst of catch-up passes.
  interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

  tracing::info!(
    campaign_id = %schedule.campaign_id,
    interval_secs = period.as_secs(),
    max_concurrent = schedule.max_concurrent,
    "campaign scheduler started"
  );

  loop {
    interval.tick().await;

    match dispatcher
      .run_campaign(&schedule.campaign_id, &schedule.script_id, schedule.max_concurrent)
      .await
    {
      Ok(report) => tracing::debug!(
        campaign_id = %schedule.campaign_id,
        initiated = report.initiated.len(),
        failed = report.failed,
        "scheduled dispatch pass finished"
      ),
      Err(e) => tracing::error!(
        campaign_id = %schedule.campaign_id,
        error = %e,
        "scheduled dispatch pass failed"
      ),
    }
  }
}
