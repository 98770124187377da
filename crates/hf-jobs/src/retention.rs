//! Background retention sweep.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::orchestrator::Orchestrator;

/// Periodically retire terminal jobs older than `retention` and delete their
/// artifacts.
///
/// Runs until the cancellation token is triggered. The first sweep happens
/// one full `interval` after start.
pub async fn run_retention_sweep(
    orchestrator: Orchestrator,
    retention: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    let retention = match chrono::Duration::from_std(retention) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!("Retention window out of range, sweep disabled: {e}");
            return;
        }
    };

    tracing::info!(
        retention_hours = retention.num_hours(),
        interval_secs = interval.as_secs(),
        "Retention sweep started"
    );

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = orchestrator.sweep_expired(retention).await;
                tracing::debug!(jobs_retired = report.jobs_retired, "Retention sweep tick");
            }
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!("Retention sweep stopped");
}
