//! Agent Evals - multi-tenant evaluation dashboard service
//!
//! Collects scored AI-agent interactions from agents and turns them into
//! per-owner KPIs:
//! - Ingestion with field and range validation
//! - Owner-scoped storage on libSQL
//! - Pure KPI aggregation (summary and per-day series)
//! - Length-preserving PII obfuscation for the detail view
//! - Per-owner evaluation settings
//!
//! # Architecture
//!
//! - **Types**: records, payloads, owners, settings
//! - **Storage**: the `StorageBackend` trait and its libSQL implementation
//! - **Source**: store-backed or synthetic records for the read path
//! - **Services**: ingestion and dashboard views
//! - **API**: axum HTTP surface with owner resolution
//!
//! # Example
//!
//! ```ignore
//! use agent_evals_core::{IngestService, LibsqlStorage, OwnerId, EvaluationPayload};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let storage = Arc::new(LibsqlStorage::in_memory().await?);
//!     let ingest = IngestService::new(storage);
//!
//!     let record = ingest.ingest(&OwnerId::new("alice"), EvaluationPayload {
//!         interaction_id: Some("int-1".into()),
//!         prompt: Some("Summarize the ticket".into()),
//!         response: Some("The customer wants a refund.".into()),
//!         score: Some(0.9),
//!         latency_ms: Some(420),
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("stored {}", record.id);
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ingest;
pub mod redaction;
pub mod source;
pub mod storage;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use aggregation::{bucket_by_day, summarize, DayBucket, KpiSummary};
pub use config::AppConfig;
pub use dashboard::DashboardService;
pub use error::{EvalError, Result};
pub use ingest::IngestService;
pub use source::{DataSourceKind, EvaluationSource, StoreSource, SyntheticSource};
pub use storage::{
    libsql::{ConnectionMode, LibsqlStorage},
    StorageBackend,
};
pub use types::{
    EvaluationId, EvaluationPayload, EvaluationRecord, EvaluationSettings, OwnerId, RunPolicy,
};
