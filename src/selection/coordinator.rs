use super::interface::{CatalogStore, ConsumptionRecorder, Item, StoreError, Subject};
use super::random::{RandomSource, ThreadRandom};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const DEFAULT_RECORD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RecordError {
    #[error("recorder timed out after {0} ms")]
    Timeout(u64),
    #[error("recorder failed: {0}")]
    Failed(String),
}

/// Result of one selection attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SelectionOutcome {
    NoItemsAvailable,
    Recorded { item: Item, at: DateTime<Utc> },
    /// The pick happened but the record was not written. The item is kept
    /// so it can still be shown.
    RecordingFailed { item: Item, error: RecordError },
}

impl SelectionOutcome {
    pub fn item(&self) -> Option<&Item> {
        match self {
            SelectionOutcome::NoItemsAvailable => None,
            SelectionOutcome::Recorded { item, .. }
            | SelectionOutcome::RecordingFailed { item, .. } => Some(item),
        }
    }

    pub fn is_recorded(&self) -> bool {
        matches!(self, SelectionOutcome::Recorded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("Catalog lookup failed: {0}")]
    CatalogLookupFailed(StoreError),
    #[error("Unknown patient: {0}")]
    UnknownSubject(String),
}

/// Owns the active patient and its tablet list; performs picks.
///
/// `trigger_selection` may run concurrently from the signal loop and from
/// manual commands. Each call is an independent pick-and-record; nothing is
/// deduplicated.
pub struct SelectionCoordinator {
    catalog: Arc<dyn CatalogStore>,
    recorder: Arc<dyn ConsumptionRecorder>,
    random: Arc<dyn RandomSource>,
    record_timeout: Duration,
    subjects: RwLock<Vec<Subject>>,
    active: RwLock<Option<Subject>>,
    items: RwLock<Vec<Item>>,
    last_outcome: RwLock<Option<SelectionOutcome>>,
}

impl SelectionCoordinator {
    pub fn new(catalog: Arc<dyn CatalogStore>, recorder: Arc<dyn ConsumptionRecorder>) -> Self {
        Self {
            catalog,
            recorder,
            random: Arc::new(ThreadRandom),
            record_timeout: DEFAULT_RECORD_TIMEOUT,
            subjects: RwLock::new(Vec::new()),
            active: RwLock::new(None),
            items: RwLock::new(Vec::new()),
            last_outcome: RwLock::new(None),
        }
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn with_record_timeout(mut self, timeout: Duration) -> Self {
        self.record_timeout = timeout;
        self
    }

    // ── Patient / tablet loading ───────────────────────────

    /// Reload the patient list. Activates the first patient when none is
    /// active yet.
    pub async fn refresh_subjects(&self) -> Result<Vec<Subject>, SelectionError> {
        let subjects = self
            .catalog
            .list_subjects()
            .await
            .map_err(SelectionError::CatalogLookupFailed)?;
        tracing::info!("[Selection] Loaded {} patients", subjects.len());
        *self.subjects.write().await = subjects.clone();

        let has_active = self.active.read().await.is_some();
        if !has_active {
            if let Some(first) = subjects.first() {
                self.change_subject(&first.id).await?;
            }
        }
        Ok(subjects)
    }

    /// Make a known patient active and load its tablets. The previous
    /// tablet list is cleared first, so a failed load leaves it empty.
    pub async fn change_subject(&self, subject_id: &str) -> Result<usize, SelectionError> {
        let subject = self
            .subjects
            .read()
            .await
            .iter()
            .find(|s| s.id == subject_id)
            .cloned()
            .ok_or_else(|| SelectionError::UnknownSubject(subject_id.to_string()))?;

        {
            let mut active = self.active.write().await;
            let mut items = self.items.write().await;
            *active = Some(subject.clone());
            items.clear();
        }
        tracing::info!("[Selection] Active patient: {} ({})", subject.name, subject.id);

        self.load_items(&subject).await
    }

    /// Reload tablets for the active patient, if any.
    pub async fn reload_items(&self) -> Result<usize, SelectionError> {
        let subject = self.active.read().await.clone();
        match subject {
            Some(subject) => self.load_items(&subject).await,
            None => Ok(0),
        }
    }

    async fn load_items(&self, subject: &Subject) -> Result<usize, SelectionError> {
        let loaded = self
            .catalog
            .list_items(&subject.id)
            .await
            .map_err(|e| {
                tracing::warn!("[Selection] Failed to load tablets for {}: {}", subject.id, e);
                SelectionError::CatalogLookupFailed(e)
            })?;

        let active = self.active.read().await;
        if active.as_ref().map(|s| s.id.as_str()) != Some(subject.id.as_str()) {
            // Patient switched while loading; the newer switch owns the list.
            return Ok(0);
        }
        let mut items = self.items.write().await;
        *items = loaded;
        tracing::info!("[Selection] Loaded {} tablets for {}", items.len(), subject.name);
        Ok(items.len())
    }

    // ── Picking ────────────────────────────────────────────

    /// Pick one tablet uniformly at random and record it as consumed.
    pub async fn trigger_selection(&self) -> SelectionOutcome {
        // Snapshot under the read lock; the recorder call happens without it.
        let picked = {
            let items = self.items.read().await;
            if items.is_empty() {
                None
            } else {
                Some(items[self.random.pick_index(items.len())].clone())
            }
        };

        let outcome = match picked {
            None => {
                tracing::info!("[Selection] No tablets loaded for this patient.");
                SelectionOutcome::NoItemsAvailable
            }
            Some(item) => self.record(item).await,
        };

        *self.last_outcome.write().await = Some(outcome.clone());
        outcome
    }

    async fn record(&self, item: Item) -> SelectionOutcome {
        let at = Utc::now();
        let call = self.recorder.record_consumed(&item.id, at);
        match tokio::time::timeout(self.record_timeout, call).await {
            Ok(Ok(())) => {
                tracing::info!("[Selection] Consumed recorded: {} ({})", item.label, item.id);
                SelectionOutcome::Recorded { item, at }
            }
            Ok(Err(e)) => {
                tracing::warn!("[Selection] Recording {} failed: {}", item.id, e);
                SelectionOutcome::RecordingFailed {
                    item,
                    error: RecordError::Failed(e.to_string()),
                }
            }
            Err(_) => {
                let ms = self.record_timeout.as_millis() as u64;
                tracing::warn!("[Selection] Recording {} timed out after {} ms", item.id, ms);
                SelectionOutcome::RecordingFailed {
                    item,
                    error: RecordError::Timeout(ms),
                }
            }
        }
    }

    // ── Read accessors ─────────────────────────────────────

    pub async fn active_subject(&self) -> Option<Subject> {
        self.active.read().await.clone()
    }

    pub async fn subjects(&self) -> Vec<Subject> {
        self.subjects.read().await.clone()
    }

    pub async fn items(&self) -> Vec<Item> {
        self.items.read().await.clone()
    }

    pub async fn last_outcome(&self) -> Option<SelectionOutcome> {
        self.last_outcome.read().await.clone()
    }
}
