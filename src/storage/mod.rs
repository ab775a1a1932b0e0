//! Storage layer for evaluation records and settings
//!
//! Provides the backend trait used by ingestion and the dashboard views,
//! and a libSQL implementation. Every operation is scoped by owner id;
//! tenant isolation lives here rather than in the core logic.

pub mod libsql;

use crate::error::Result;
use crate::types::{EvaluationId, EvaluationRecord, EvaluationSettings, OwnerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;

/// Storage backend trait defining all required operations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Append a new evaluation record
    async fn insert_evaluation(&self, record: &EvaluationRecord) -> Result<()>;

    /// Retrieve one record by id, only if it belongs to `owner`
    async fn get_evaluation(
        &self,
        owner: &OwnerId,
        id: &EvaluationId,
    ) -> Result<Option<EvaluationRecord>>;

    /// List an owner's records with range filter, ordering and pagination
    async fn list_evaluations(
        &self,
        owner: &OwnerId,
        query: &ListQuery,
    ) -> Result<Vec<EvaluationRecord>>;

    /// Count an owner's records matching the range filter (pagination ignored)
    async fn count_evaluations(&self, owner: &OwnerId, query: &ListQuery) -> Result<u64>;

    /// Fetch an owner's settings, if ever saved
    async fn get_settings(&self, owner: &OwnerId) -> Result<Option<EvaluationSettings>>;

    /// Insert or replace an owner's settings
    async fn upsert_settings(
        &self,
        owner: &OwnerId,
        settings: &EvaluationSettings,
    ) -> Result<EvaluationSettings>;

    /// Verify the backend is reachable
    async fn check_health(&self) -> Result<()>;
}

/// Sort order on `created_at`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Filter, order and page parameters for listing records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_to: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub offset: u64,
    /// `None` returns every matching row
    pub limit: Option<u64>,
}

impl ListQuery {
    /// Everything created at or after `since`, oldest first
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            created_from: Some(since),
            order: SortOrder::Ascending,
            ..Default::default()
        }
    }

    /// One page of the newest-first listing
    pub fn page(offset: u64, limit: u64) -> Self {
        Self {
            order: SortOrder::Descending,
            offset,
            limit: Some(limit),
            ..Default::default()
        }
    }
}
