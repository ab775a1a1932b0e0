//! On-disk libSQL storage tests
//!
//! Exercises the file-backed database across reopen, which the in-memory
//! unit tests cannot cover.

use agent_evals_core::{
    storage::ListQuery, ConnectionMode, EvaluationPayload, EvaluationSettings, IngestService,
    LibsqlStorage, OwnerId, RunPolicy, StorageBackend,
};
use std::sync::Arc;
use tempfile::TempDir;

fn payload(interaction_id: &str) -> EvaluationPayload {
    EvaluationPayload {
        interaction_id: Some(interaction_id.to_string()),
        prompt: Some("Write unit tests for a user registration function".into()),
        response: Some("Cover duplicate emails and weak passwords.".into()),
        score: Some(0.75),
        latency_ms: Some(0),
        flags: Some(vec!["unsafe_content".into(), "failed".into()]),
        pii_tokens_redacted: Some(4),
    }
}

fn local(dir: &TempDir) -> ConnectionMode {
    ConnectionMode::Local(
        dir.path()
            .join("nested")
            .join("evals.db")
            .to_string_lossy()
            .into_owned(),
    )
}

#[tokio::test]
async fn test_records_and_settings_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let owner = OwnerId::new("alice");

    let stored = {
        let storage = Arc::new(LibsqlStorage::new(local(&dir)).await.unwrap());
        let ingest = IngestService::new(storage.clone());
        let record = ingest.ingest(&owner, payload("int-1")).await.unwrap();
        storage
            .upsert_settings(
                &owner,
                &EvaluationSettings {
                    run_policy: RunPolicy::Sampled,
                    sample_rate_pct: 5,
                    obfuscate_pii: true,
                    max_eval_per_day: 20,
                },
            )
            .await
            .unwrap();
        record
    };

    // reopening runs migrations again; they must be no-ops
    let storage = LibsqlStorage::new(local(&dir)).await.unwrap();
    let loaded = storage
        .get_evaluation(&owner, &stored.id)
        .await
        .unwrap()
        .expect("record persisted");
    assert_eq!(loaded, stored);
    assert_eq!(loaded.latency_ms, 0);
    assert_eq!(loaded.flags, vec!["unsafe_content", "failed"]);

    let settings = storage.get_settings(&owner).await.unwrap().unwrap();
    assert!(settings.obfuscate_pii);
    assert_eq!(settings.sample_rate_pct, 5);

    assert_eq!(
        storage
            .count_evaluations(&owner, &ListQuery::default())
            .await
            .unwrap(),
        1
    );
    storage.check_health().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_ingestion_appends_every_record() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(LibsqlStorage::new(local(&dir)).await.unwrap());
    let ingest = IngestService::new(storage.clone());
    let owner = OwnerId::new("alice");

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let ingest = ingest.clone();
            let owner = owner.clone();
            tokio::spawn(async move { ingest.ingest(&owner, payload(&format!("int-{}", i))).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        storage
            .count_evaluations(&owner, &ListQuery::default())
            .await
            .unwrap(),
        20
    );
}
