//! Dashboard: read model and commands for the operator-facing surface.
//!
//! Purely reactive: it reads coordinator / counter state and forwards the
//! operator commands (change patient, pick now, fire the counter).

pub mod console;

use crate::activity::{ActivityLog, LogEntry, LogKind};
use crate::counter::{CounterError, CounterHandle, CounterSnapshot};
use crate::selection::{
    log_outcome, Item, SelectionCoordinator, SelectionError, SelectionOutcome, StoreError, Subject,
};
use crate::store::{HistoryEntry, SqliteStore};
use serde::Serialize;
use std::sync::Arc;

/// Point-in-time snapshot for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub subject: Option<Subject>,
    pub subjects: Vec<Subject>,
    pub items: Vec<Item>,
    pub last_outcome: Option<SelectionOutcome>,
    /// `None` when the counter task is gone.
    pub counter: Option<CounterSnapshot>,
    pub log: Vec<LogEntry>,
}

#[derive(Clone)]
pub struct Dashboard {
    coordinator: Arc<SelectionCoordinator>,
    counter: CounterHandle,
    log: ActivityLog,
    history: Option<Arc<SqliteStore>>,
}

impl Dashboard {
    pub fn new(
        coordinator: Arc<SelectionCoordinator>,
        counter: CounterHandle,
        log: ActivityLog,
    ) -> Self {
        Self {
            coordinator,
            counter,
            log,
            history: None,
        }
    }

    pub fn with_history(mut self, store: Arc<SqliteStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }

    pub async fn view(&self, log_lines: usize) -> DashboardView {
        DashboardView {
            subject: self.coordinator.active_subject().await,
            subjects: self.coordinator.subjects().await,
            items: self.coordinator.items().await,
            last_outcome: self.coordinator.last_outcome().await,
            counter: self.counter.snapshot().await.ok(),
            log: self.log.recent(log_lines),
        }
    }

    /// Reload the patient list. Failures are user-visible via the log.
    pub async fn refresh(&self) -> Result<Vec<Subject>, SelectionError> {
        self.coordinator.refresh_subjects().await.map_err(|e| {
            self.log.push(LogKind::Error, format!("DB Error: {}", e));
            e
        })
    }

    pub async fn change_subject(&self, subject_id: &str) -> Result<usize, SelectionError> {
        match self.coordinator.change_subject(subject_id).await {
            Ok(count) => {
                if let Some(subject) = self.coordinator.active_subject().await {
                    self.log.push(
                        LogKind::Info,
                        format!("Selected {} (ID:{}), {} tablets", subject.name, subject.id, count),
                    );
                }
                Ok(count)
            }
            Err(e) => {
                self.log.push(LogKind::Error, format!("DB Error: {}", e));
                Err(e)
            }
        }
    }

    /// Change patient by 1-based position in the patient list.
    pub async fn change_subject_by_position(
        &self,
        position: usize,
    ) -> Result<usize, SelectionError> {
        let subjects = self.coordinator.subjects().await;
        let subject = position
            .checked_sub(1)
            .and_then(|i| subjects.get(i))
            .ok_or_else(|| SelectionError::UnknownSubject(format!("#{}", position)))?;
        self.change_subject(&subject.id).await
    }

    /// Operator "pick now": goes straight to the coordinator, bypassing the
    /// counter.
    pub async fn manual_trigger(&self) -> SelectionOutcome {
        self.log.push(LogKind::Info, "Manual pick requested");
        let outcome = self.coordinator.trigger_selection().await;
        log_outcome(&self.log, &outcome);
        outcome
    }

    /// Fire the counter now with its pending tally. The resulting pick runs
    /// through the signal loop like a threshold fire.
    pub async fn fire_counter(&self) -> Result<u32, CounterError> {
        let signal = self.counter.trigger().await.map_err(|e| {
            self.log.push(LogKind::Error, format!("Counter unavailable: {}", e));
            e
        })?;
        Ok(signal.count())
    }

    /// Consumption history of the active patient, newest first. Empty when
    /// no patient is active or no history store is attached.
    pub async fn history(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let (Some(store), Some(subject)) =
            (&self.history, self.coordinator.active_subject().await)
        else {
            return Ok(Vec::new());
        };
        store.consumed_for_patient(&subject.id).await
    }
}
