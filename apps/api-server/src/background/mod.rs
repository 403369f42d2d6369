//! Background jobs.

#[cfg(feature = "scheduler")]
mod scheduler;

#[cfg(feature = "scheduler")]
pub use scheduler::{Scheduler, SchedulerConfig};

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::state::AppState;

/// Sweep period when no cron schedule drives it.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Drop expired buckets and block records.
pub async fn sweep_expired(state: &AppState) {
    let buckets = state.limiter.sweep_expired().await;
    let records = state.blocker.sweep_expired().await;

    tracing::debug!(buckets, block_records = records, "Expiry sweep finished");
}

/// Run the sweep on a fixed interval. The first sweep runs immediately.
pub fn spawn_interval_sweep(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            sweep_expired(&state).await;
        }
    })
}

/// Start the periodic expiry sweep.
///
/// Returns the running scheduler when cron drives the sweep, `None` when the
/// scheduler is disabled and the interval loop runs instead.
#[cfg(feature = "scheduler")]
pub async fn start_sweep(
    config: SchedulerConfig,
    state: AppState,
) -> Result<Option<Scheduler>, tokio_cron_scheduler::JobSchedulerError> {
    if !config.enabled {
        tracing::info!(
            period_secs = SWEEP_INTERVAL.as_secs(),
            "Scheduler disabled, sweeping on a fixed interval"
        );
        spawn_interval_sweep(state, SWEEP_INTERVAL);
        return Ok(None);
    }

    let scheduler = Scheduler::new(config).await?;
    register_sweep(&scheduler, state).await?;
    scheduler.start().await?;
    Ok(Some(scheduler))
}

/// Register the periodic expiry sweep.
#[cfg(feature = "scheduler")]
pub async fn register_sweep(
    scheduler: &Scheduler,
    state: AppState,
) -> Result<uuid::Uuid, tokio_cron_scheduler::JobSchedulerError> {
    let schedule = scheduler.config().sweep_schedule.clone();
    scheduler
        .add_cron(&schedule, move || {
            let state = state.clone();
            async move { sweep_expired(&state).await }
        })
        .await
}
