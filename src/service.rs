//! Identity-gated analysis service.
//!
//! [`AnalysisService`] is what a host application (web handler, job worker)
//! talks to. It runs an [`Analyzer`] and keeps the results in an
//! [`AnalysisStore`], under two rules:
//!
//! * anonymous callers may analyse but nothing is stored for them;
//! * every store operation is scoped to the caller's user id and refused
//!   without an identity.
//!
//! Persistence is best-effort: a failed insert is logged and the analysis is
//! still returned, since the caller already paid for the model call.

use crate::analyze::Analyzer;
use crate::error::AnalysisError;
use crate::identity::Identity;
use crate::output::{AnalysisOutput, DisclosureLabels};
use crate::store::{AnalysisRecord, AnalysisStore, NewAnalysis};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of [`AnalysisService::analyze_and_save`].
#[derive(Debug, Clone)]
pub struct SavedAnalysis {
    pub output: AnalysisOutput,
    /// Id of the stored record; `None` when the caller was anonymous or the
    /// store failed.
    pub record_id: Option<Uuid>,
}

pub struct AnalysisService<S: AnalysisStore> {
    analyzer: Analyzer,
    store: Arc<S>,
}

impl<S: AnalysisStore> AnalysisService<S> {
    pub fn new(analyzer: Analyzer, store: Arc<S>) -> Self {
        Self { analyzer, store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Analyse an uploaded PDF and store the result for `identity`.
    pub async fn analyze_and_save(
        &self,
        identity: Option<&Identity>,
        bytes: &[u8],
        upload_name: &str,
        labels: &DisclosureLabels,
    ) -> Result<SavedAnalysis, AnalysisError> {
        let output = self.analyzer.analyze_bytes(bytes, upload_name, labels).await?;

        let Ok(owner) = require(identity) else {
            debug!("Anonymous analysis of '{}' not stored", output.filename);
            return Ok(SavedAnalysis {
                output,
                record_id: None,
            });
        };

        let record_id = match self
            .store
            .insert(NewAnalysis::from_output(owner, &output))
            .await
        {
            Ok(record) => {
                info!("Stored analysis {} for user {}", record.id, owner);
                Some(record.id)
            }
            Err(e) => {
                warn!("Failed to store analysis of '{}': {}", output.filename, e);
                None
            }
        };

        Ok(SavedAnalysis { output, record_id })
    }

    /// The caller's stored analyses, newest first.
    pub async fn history(
        &self,
        identity: Option<&Identity>,
    ) -> Result<Vec<AnalysisRecord>, AnalysisError> {
        let owner = require(identity)?;
        self.store.list_by_owner(owner).await
    }

    /// One stored analysis of the caller.
    pub async fn get(
        &self,
        identity: Option<&Identity>,
        id: Uuid,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let owner = require(identity)?;
        self.store
            .get(id, owner)
            .await?
            .ok_or_else(|| AnalysisError::NotFound { id: id.to_string() })
    }

    /// Delete one stored analysis of the caller.
    pub async fn delete(&self, identity: Option<&Identity>, id: Uuid) -> Result<(), AnalysisError> {
        let owner = require(identity)?;
        if self.store.delete(id, owner).await? {
            Ok(())
        } else {
            Err(AnalysisError::NotFound { id: id.to_string() })
        }
    }

    /// Delete all stored analyses of the caller; returns how many went.
    pub async fn delete_all(&self, identity: Option<&Identity>) -> Result<usize, AnalysisError> {
        let owner = require(identity)?;
        let removed = self.store.delete_all(owner).await?;
        info!("Deleted {} analyses for user {}", removed, owner);
        Ok(removed)
    }
}

fn require(identity: Option<&Identity>) -> Result<&str, AnalysisError> {
    identity
        .map(|i| i.user_id.as_str())
        .filter(|id| !id.is_empty())
        .ok_or(AnalysisError::Unauthenticated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_user_id_is_anonymous() {
        let blank = Identity::new("");
        assert!(matches!(
            require(Some(&blank)),
            Err(AnalysisError::Unauthenticated)
        ));
        assert!(matches!(require(None), Err(AnalysisError::Unauthenticated)));
        assert_eq!(require(Some(&Identity::new("u1"))).unwrap(), "u1");
    }
}
