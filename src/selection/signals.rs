//! Signal loop: hands counter signals to the coordinator outside the
//! counter task.

use super::coordinator::{SelectionCoordinator, SelectionOutcome};
use crate::activity::{ActivityLog, LogKind};
use crate::counter::{CounterSignal, FireReason};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Consume counter signals until the counter goes away.
///
/// Each fire spawns its own selection task, so a slow recorder never delays
/// the next signal. Outstanding selections are awaited before returning.
pub async fn run_signal_loop(
    coordinator: Arc<SelectionCoordinator>,
    mut signals: mpsc::UnboundedReceiver<CounterSignal>,
    log: ActivityLog,
    window_secs: u64,
) {
    let mut selections = JoinSet::new();

    while let Some(signal) = signals.recv().await {
        match signal {
            CounterSignal::Fire { count, reason, .. } => {
                let message = match reason {
                    FireReason::Threshold => {
                        format!("Threshold reached ({}). Triggering random pick.", count)
                    }
                    FireReason::Manual => {
                        format!("Manual fire ({} pending). Triggering random pick.", count)
                    }
                };
                log.push(LogKind::Fire, message);

                let coordinator = coordinator.clone();
                let log = log.clone();
                selections.spawn(async move {
                    let outcome = coordinator.trigger_selection().await;
                    log_outcome(&log, &outcome);
                });
            }
            CounterSignal::SilentReset { count, .. } => {
                log.push(
                    LogKind::SilentReset,
                    format!("Reset counter (received {} in last {}s)", count, window_secs),
                );
            }
        }

        while let Some(joined) = selections.try_join_next() {
            if let Err(e) = joined {
                tracing::error!("[Selection] Pick task failed: {}", e);
            }
        }
    }

    while let Some(joined) = selections.join_next().await {
        if let Err(e) = joined {
            tracing::error!("[Selection] Pick task failed: {}", e);
        }
    }
    tracing::info!("[Selection] Signal loop finished");
}

/// Append a human-readable line for a selection outcome.
pub fn log_outcome(log: &ActivityLog, outcome: &SelectionOutcome) {
    match outcome {
        SelectionOutcome::NoItemsAvailable => {
            log.push(LogKind::Selection, "No tablets loaded for this patient.");
        }
        SelectionOutcome::Recorded { item, at } => {
            log.push(
                LogKind::Selection,
                format!(
                    "Consumed recorded → {} at {}",
                    item.label,
                    at.with_timezone(&chrono::Local).format("%H:%M:%S")
                ),
            );
        }
        SelectionOutcome::RecordingFailed { item, error } => {
            log.push(
                LogKind::Error,
                format!("Picked {} but recording failed: {}", item.label, error),
            );
        }
    }
}
