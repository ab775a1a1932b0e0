//! Evaluation ingestion
//!
//! Validates one payload and appends exactly one record to the store. There
//! is no deduplication: identical payloads produce distinct records. All
//! validation happens before the write, so a rejected call never leaves a
//! partial row behind.

use crate::error::Result;
use crate::storage::StorageBackend;
use crate::types::{EvaluationId, EvaluationPayload, EvaluationRecord, OwnerId};
use crate::validation::{validate_payload, ValidatedPayload};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Ingestion handler bound to a storage backend
#[derive(Clone)]
pub struct IngestService {
    storage: Arc<dyn StorageBackend>,
}

impl IngestService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Validate `payload` and store it as a new record owned by `owner`
    ///
    /// Returns the stored record including its generated id and timestamp.
    pub async fn ingest(
        &self,
        owner: &OwnerId,
        payload: EvaluationPayload,
    ) -> Result<EvaluationRecord> {
        let validated = match validate_payload(payload) {
            Ok(v) => v,
            Err(e) => {
                debug!("Rejected evaluation from {}: {}", owner, e);
                return Err(e);
            }
        };

        // stored timestamps carry microsecond precision
        let record = build_record(owner, validated, Utc::now().trunc_subsecs(6));

        if let Err(e) = self.storage.insert_evaluation(&record).await {
            error!("Error inserting evaluation for {}: {}", owner, e);
            return Err(e);
        }

        info!(
            "Evaluation {} ingested for {} (interaction {})",
            record.id, owner, record.interaction_id
        );
        Ok(record)
    }
}

fn build_record(
    owner: &OwnerId,
    validated: ValidatedPayload,
    created_at: DateTime<Utc>,
) -> EvaluationRecord {
    EvaluationRecord {
        id: EvaluationId::new(),
        owner_id: owner.clone(),
        interaction_id: validated.interaction_id,
        prompt: validated.prompt,
        response: validated.response,
        score: validated.score,
        latency_ms: validated.latency_ms,
        flags: validated.flags,
        pii_tokens_redacted: validated.pii_tokens_redacted,
        created_at,
    }
}
