//! Record sources for the read path
//!
//! The dashboard reads through an [`EvaluationSource`] chosen explicitly by
//! the caller: either the real store or a deterministic synthetic data set
//! for demos. There is no automatic fallback from one to the other.

use crate::error::Result;
use crate::storage::{ListQuery, StorageBackend};
use crate::types::{EvaluationId, EvaluationRecord, OwnerId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which source backs the dashboard views
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceKind {
    #[default]
    Store,
    Synthetic,
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceKind::Store => write!(f, "store"),
            DataSourceKind::Synthetic => write!(f, "synthetic"),
        }
    }
}

/// Owner-scoped read access to evaluation records
#[async_trait]
pub trait EvaluationSource: Send + Sync {
    /// Records created at or after `since`, oldest first
    async fn recent(&self, owner: &OwnerId, since: DateTime<Utc>) -> Result<Vec<EvaluationRecord>>;

    /// One page of records, newest first
    async fn page(&self, owner: &OwnerId, offset: u64, limit: u64) -> Result<Vec<EvaluationRecord>>;

    /// Total number of records for `owner`
    async fn count(&self, owner: &OwnerId) -> Result<u64>;

    /// A single record, if it exists and belongs to `owner`
    async fn find(&self, owner: &OwnerId, id: &EvaluationId) -> Result<Option<EvaluationRecord>>;

    /// True when the records are generated rather than stored
    fn is_synthetic(&self) -> bool;
}

/// Build the source selected by configuration
pub fn build_source(
    kind: DataSourceKind,
    storage: Arc<dyn StorageBackend>,
) -> Arc<dyn EvaluationSource> {
    match kind {
        DataSourceKind::Store => Arc::new(StoreSource::new(storage)),
        DataSourceKind::Synthetic => Arc::new(SyntheticSource::new()),
    }
}

/// Reads straight through the storage backend
pub struct StoreSource {
    storage: Arc<dyn StorageBackend>,
}

impl StoreSource {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EvaluationSource for StoreSource {
    async fn recent(&self, owner: &OwnerId, since: DateTime<Utc>) -> Result<Vec<EvaluationRecord>> {
        self.storage
            .list_evaluations(owner, &ListQuery::since(since))
            .await
    }

    async fn page(&self, owner: &OwnerId, offset: u64, limit: u64) -> Result<Vec<EvaluationRecord>> {
        self.storage
            .list_evaluations(owner, &ListQuery::page(offset, limit))
            .await
    }

    async fn count(&self, owner: &OwnerId) -> Result<u64> {
        self.storage
            .count_evaluations(owner, &ListQuery::default())
            .await
    }

    async fn find(&self, owner: &OwnerId, id: &EvaluationId) -> Result<Option<EvaluationRecord>> {
        self.storage.get_evaluation(owner, id).await
    }

    fn is_synthetic(&self) -> bool {
        false
    }
}

/// Number of generated records
pub const SYNTHETIC_RECORD_COUNT: usize = 120;

/// Generated records are spread over this many days before the anchor
pub const SYNTHETIC_SPAN_DAYS: i64 = 30;

const SYNTHETIC_SEED: u64 = 0x5EED_E7A1;

const SAMPLE_PROMPTS: &[&str] = &[
    "Generate a function to calculate the fibonacci sequence in JavaScript",
    "Write a React component that displays a counter with increment and decrement buttons",
    "Create a SQL query to retrieve all customers who made a purchase in the last 30 days",
    "Explain how to implement authentication with JWT in a Node.js application",
    "How do I configure a CI/CD pipeline for my GitHub repository?",
    "Write unit tests for a user registration function",
    "What's the best way to optimize database queries for a large dataset?",
    "Create a Python script that processes CSV files and generates reports",
    "How can I debug memory leaks in my web application?",
    "Create a responsive navigation menu with CSS and JavaScript",
    "What design patterns should I use for my e-commerce application?",
    "Write a bash script to automate deployment to AWS",
];

const SAMPLE_RESPONSES: &[&str] = &[
    "Here is a memoized recursive implementation that avoids exponential time by caching previously computed values.",
    "The component keeps the count in local state and renders two buttons that update it.",
    "Join customers to orders, filter orders by date within the last 30 days and select distinct customers.",
    "Issue a signed token at login, verify it in middleware on protected routes and reject expired tokens.",
    "Index the columns used in filters and joins, select only needed columns and paginate large result sets.",
    "Start with the happy path, then cover duplicate emails, weak passwords and storage failures.",
];

/// Deterministic demo data
///
/// Produces the same records for the same anchor time: the generator is
/// seeded with a fixed value and only day offsets depend on the anchor.
pub struct SyntheticSource {
    anchor: Option<DateTime<Utc>>,
}

impl SyntheticSource {
    /// Records are generated relative to the current time on every call
    pub fn new() -> Self {
        Self { anchor: None }
    }

    /// Records are generated relative to a fixed instant
    pub fn anchored(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor: Some(anchor),
        }
    }

    /// Generate the full data set for `owner`, newest first
    pub fn generate(&self, owner: &OwnerId) -> Vec<EvaluationRecord> {
        let now = self.anchor.unwrap_or_else(Utc::now);
        generate_records(owner, now, SYNTHETIC_RECORD_COUNT)
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate `count` plausible records spread over the 30 days before `now`
///
/// Also used by the `seed` command.
pub fn generate_records(owner: &OwnerId, now: DateTime<Utc>, count: usize) -> Vec<EvaluationRecord> {
    let mut rng = StdRng::seed_from_u64(SYNTHETIC_SEED);
    let mut records: Vec<EvaluationRecord> = (0..count)
        .map(|i| {
            let days_ago = rng.gen_range(0..SYNTHETIC_SPAN_DAYS);
            let suffix: u32 = rng.gen_range(0..1000);

            let mut flags = Vec::new();
            if rng.gen_range(0..100) > 80 {
                flags.push("unsafe_content".to_string());
            }
            if rng.gen_range(0..100) > 90 {
                flags.push("hallucination".to_string());
            }
            if rng.gen_range(0..100) > 92 {
                flags.push("failed".to_string());
            }

            let id = format!("mock-{}-{}", i, suffix);
            EvaluationRecord {
                interaction_id: format!("int-{}-{:03}", i, suffix),
                id: EvaluationId(id),
                owner_id: owner.clone(),
                prompt: SAMPLE_PROMPTS[i % SAMPLE_PROMPTS.len()].to_string(),
                response: SAMPLE_RESPONSES[i % SAMPLE_RESPONSES.len()].to_string(),
                score: f64::from(rng.gen_range(30..=100u32)) / 100.0,
                latency_ms: rng.gen_range(100..3100),
                flags,
                pii_tokens_redacted: rng.gen_range(0..5),
                created_at: now - Duration::days(days_ago),
            }
        })
        .collect();

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.0.cmp(&b.id.0)));
    records
}

#[async_trait]
impl EvaluationSource for SyntheticSource {
    async fn recent(&self, owner: &OwnerId, since: DateTime<Utc>) -> Result<Vec<EvaluationRecord>> {
        let mut records: Vec<_> = self
            .generate(owner)
            .into_iter()
            .filter(|r| r.created_at >= since)
            .collect();
        records.reverse();
        Ok(records)
    }

    async fn page(&self, owner: &OwnerId, offset: u64, limit: u64) -> Result<Vec<EvaluationRecord>> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self
            .generate(owner)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn count(&self, _owner: &OwnerId) -> Result<u64> {
        Ok(SYNTHETIC_RECORD_COUNT as u64)
    }

    async fn find(&self, owner: &OwnerId, id: &EvaluationId) -> Result<Option<EvaluationRecord>> {
        Ok(self.generate(owner).into_iter().find(|r| &r.id == id))
    }

    fn is_synthetic(&self) -> bool {
        true
    }
}
