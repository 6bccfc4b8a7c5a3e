use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Domain Types ───────────────────────────────────────

/// A patient that can be made active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
}

/// A tablet (medication) belonging to a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub label: String,
}

/// One consumed dose. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub item_id: String,
    pub consumed_at: DateTime<Utc>,
}

// ── Error Types ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

// ── Collaborator Traits ────────────────────────────────

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All patients, sorted by name.
    async fn list_subjects(&self) -> Result<Vec<Subject>, StoreError>;

    /// Tablets for one patient, in no particular order.
    async fn list_items(&self, subject_id: &str) -> Result<Vec<Item>, StoreError>;
}

#[async_trait]
pub trait ConsumptionRecorder: Send + Sync {
    /// Durably append one record. No uniqueness is enforced: two calls with
    /// the same arguments produce two records.
    async fn record_consumed(
        &self,
        item_id: &str,
        consumed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
