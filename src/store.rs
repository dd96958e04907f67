//! Persistence contract for finished analyses.
//!
//! [`AnalysisStore`] is the only thing the service layer knows about
//! storage. Every read and delete is scoped by owner id; a record is never
//! visible to another owner, not even by id. [`MemoryStore`] is the bundled
//! implementation, used by tests and by single-process hosts.

use crate::error::AnalysisError;
use crate::output::AnalysisOutput;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// A stored analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub filename: String,
    pub disclosure_type: String,
    pub specific_type: String,
    pub result_markdown: String,
    pub file_size: u64,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnalysis {
    pub owner_id: String,
    pub filename: String,
    pub disclosure_type: String,
    pub specific_type: String,
    pub result_markdown: String,
    pub file_size: u64,
    pub page_count: usize,
}

impl NewAnalysis {
    pub fn from_output(owner_id: impl Into<String>, output: &AnalysisOutput) -> Self {
        Self {
            owner_id: owner_id.into(),
            filename: output.filename.clone(),
            disclosure_type: output.labels.disclosure_type.clone(),
            specific_type: output.labels.specific_type.clone(),
            result_markdown: output.markdown.clone(),
            file_size: output.file_size,
            page_count: output.page_count,
        }
    }
}

/// Owner-scoped storage of analysis records.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Persist a new record and return it with its assigned id.
    async fn insert(&self, new: NewAnalysis) -> Result<AnalysisRecord, AnalysisError>;

    /// All records of `owner_id`, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<AnalysisRecord>, AnalysisError>;

    /// The record `id` if it belongs to `owner_id`.
    async fn get(&self, id: Uuid, owner_id: &str) -> Result<Option<AnalysisRecord>, AnalysisError>;

    /// Delete record `id` of `owner_id`; `false` when nothing matched.
    async fn delete(&self, id: Uuid, owner_id: &str) -> Result<bool, AnalysisError>;

    /// Delete every record of `owner_id`, returning how many were removed.
    async fn delete_all(&self, owner_id: &str) -> Result<usize, AnalysisError>;
}

/// In-process [`AnalysisStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Insertion order; newest last.
    records: RwLock<Vec<AnalysisRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across all owners.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn insert(&self, new: NewAnalysis) -> Result<AnalysisRecord, AnalysisError> {
        let record = AnalysisRecord {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            filename: new.filename,
            disclosure_type: new.disclosure_type,
            specific_type: new.specific_type,
            result_markdown: new.result_markdown,
            file_size: new.file_size,
            page_count: new.page_count,
            created_at: Utc::now(),
        };
        self.records.write().await.push(record.clone());
        debug!("Stored analysis {} for owner {}", record.id, record.owner_id);
        Ok(record)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<AnalysisRecord>, AnalysisError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: Uuid, owner_id: &str) -> Result<Option<AnalysisRecord>, AnalysisError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.id == id && r.owner_id == owner_id)
            .cloned())
    }

    async fn delete(&self, id: Uuid, owner_id: &str) -> Result<bool, AnalysisError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !(r.id == id && r.owner_id == owner_id));
        Ok(records.len() < before)
    }

    async fn delete_all(&self, owner_id: &str) -> Result<usize, AnalysisError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.owner_id != owner_id);
        Ok(before - records.len())
    }
}
