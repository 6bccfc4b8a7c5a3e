use crate::selection::interface::{
    CatalogStore, ConsumptionRecord, ConsumptionRecorder, Item, StoreError, Subject,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::str::FromStr;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS patients (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS medications (
        id TEXT PRIMARY KEY,
        patient_id TEXT NOT NULL,
        table_name TEXT NOT NULL,
        tablet_qty INTEGER NOT NULL DEFAULT 0,
        timing TEXT NOT NULL DEFAULT 'Morning',
        doctor TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        FOREIGN KEY (patient_id) REFERENCES patients(id) ON DELETE CASCADE
    );",
    "CREATE INDEX IF NOT EXISTS idx_medications_patient ON medications(patient_id);",
    "CREATE TABLE IF NOT EXISTS consumed (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        medication_id TEXT NOT NULL,
        consumed_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    );",
    "CREATE INDEX IF NOT EXISTS idx_consumed_medication ON consumed(medication_id);",
    "CREATE INDEX IF NOT EXISTS idx_consumed_at ON consumed(consumed_at DESC);",
];

const DEMO_PATIENT_EMAIL: &str = "demo@blister.local";

/// Medication fields accepted on insert.
#[derive(Debug, Clone)]
pub struct NewMedication {
    pub table_name: String,
    pub tablet_qty: u32,
    pub timing: String,
    pub doctor: String,
}

impl NewMedication {
    pub fn new(table_name: &str, tablet_qty: u32, timing: &str, doctor: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            tablet_qty,
            timing: timing.to_string(),
            doctor: doctor.to_string(),
        }
    }
}

/// One row of a patient's consumption history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub record: ConsumptionRecord,
    pub label: String,
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound(e.to_string()),
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    // Fixed width so text ordering matches time ordering.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("bad timestamp '{}': {}", raw, e)))
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database and ensure tables exist.
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        tracing::info!("[Store] Opened {}", database_url);
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn add_patient(&self, name: &str, email: &str) -> Result<Subject, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO patients (id, name, email, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(name.trim())
            .bind(email.trim().to_lowercase())
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(Subject {
            id,
            name: name.trim().to_string(),
        })
    }

    pub async fn add_medication(
        &self,
        patient_id: &str,
        medication: &NewMedication,
    ) -> Result<Item, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO medications (id, patient_id, table_name, tablet_qty, timing, doctor, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(patient_id)
        .bind(medication.table_name.trim())
        .bind(medication.tablet_qty as i64)
        .bind(&medication.timing)
        .bind(medication.doctor.trim())
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(Item {
            id,
            label: medication.table_name.trim().to_string(),
        })
    }

    /// Consumption history for a patient, newest first.
    pub async fn consumed_for_patient(
        &self,
        patient_id: &str,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, String)>(
            "SELECT c.medication_id, m.table_name, c.consumed_at
             FROM consumed c
             JOIN medications m ON m.id = c.medication_id
             WHERE m.patient_id = ?
             ORDER BY c.consumed_at DESC, c.id DESC",
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(item_id, label, consumed_at)| {
                Ok(HistoryEntry {
                    record: ConsumptionRecord {
                        item_id,
                        consumed_at: parse_timestamp(&consumed_at)?,
                    },
                    label,
                })
            })
            .collect()
    }

    /// Insert a demo patient with three tablets. Safe to run repeatedly.
    pub async fn seed_demo(&self) -> Result<Subject, StoreError> {
        let existing = sqlx::query_as::<_, (String, String)>(
            "SELECT id, name FROM patients WHERE email = ?",
        )
        .bind(DEMO_PATIENT_EMAIL)
        .fetch_optional(&self.pool)
        .await?;

        let patient = match existing {
            Some((id, name)) => Subject { id, name },
            None => {
                let patient = self.add_patient("Demo Patient", DEMO_PATIENT_EMAIL).await?;
                tracing::info!("[Store] Created demo patient {}", patient.id);
                patient
            }
        };

        let demo = [
            NewMedication::new("Aspirin", 30, "Morning", "Dr. Smith"),
            NewMedication::new("dolo 65", 20, "Morning, Afternoon", "Dr. Smith"),
            NewMedication::new("Vitamin D", 15, "Morning", "Dr. Johnson"),
        ];
        for medication in &demo {
            let (present,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM medications WHERE patient_id = ? AND table_name = ?",
            )
            .bind(&patient.id)
            .bind(&medication.table_name)
            .fetch_one(&self.pool)
            .await?;
            if present == 0 {
                self.add_medication(&patient.id, medication).await?;
                tracing::info!("[Store] Created {} medication", medication.table_name);
            }
        }

        Ok(patient)
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn list_subjects(&self) -> Result<Vec<Subject>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT id, name FROM patients ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| Subject { id, name })
            .collect())
    }

    async fn list_items(&self, subject_id: &str) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT id, table_name FROM medications WHERE patient_id = ?",
        )
        .bind(subject_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, label)| Item { id, label })
            .collect())
    }
}

#[async_trait]
impl ConsumptionRecorder for SqliteStore {
    async fn record_consumed(
        &self,
        item_id: &str,
        consumed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO consumed (medication_id, consumed_at, created_at) VALUES (?, ?, ?)")
            .bind(item_id)
            .bind(timestamp(consumed_at))
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
