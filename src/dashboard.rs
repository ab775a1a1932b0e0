//! Dashboard read views
//!
//! Composes a record source, the KPI aggregation, the owner's settings and
//! redaction into the views served by the HTTP API and the CLI.

use crate::aggregation::{bucket_by_day, summarize, DayBucket, KpiSummary};
use crate::error::{EvalError, Result};
use crate::redaction::obfuscate_if;
use crate::source::EvaluationSource;
use crate::storage::StorageBackend;
use crate::types::{EvaluationId, EvaluationRecord, EvaluationSettings, OwnerId};
use crate::validation::validate_settings;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Records per listing page
pub const PAGE_SIZE: u64 = 50;

/// Days of history feeding the dashboard
pub const DASHBOARD_WINDOW_DAYS: u32 = 30;

const SHORT_SERIES_DAYS: u32 = 7;

/// Headline KPIs plus daily series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub summary: KpiSummary,
    pub last_7_days: Vec<DayBucket>,
    pub last_30_days: Vec<DayBucket>,
    pub synthetic: bool,
}

/// One page of the newest-first listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPage {
    pub items: Vec<EvaluationRecord>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub synthetic: bool,
}

/// A single record as shown to its owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDetail {
    #[serde(flatten)]
    pub record: EvaluationRecord,
    /// Whether `prompt` and `response` were masked
    pub obfuscated: bool,
    pub synthetic: bool,
}

#[derive(Clone)]
pub struct DashboardService {
    source: Arc<dyn EvaluationSource>,
    storage: Arc<dyn StorageBackend>,
}

impl DashboardService {
    /// Settings always come from `storage`, records from `source`
    pub fn new(source: Arc<dyn EvaluationSource>, storage: Arc<dyn StorageBackend>) -> Self {
        Self { source, storage }
    }

    pub fn is_synthetic(&self) -> bool {
        self.source.is_synthetic()
    }

    pub async fn dashboard(&self, owner: &OwnerId) -> Result<DashboardView> {
        self.dashboard_at(owner, Utc::now()).await
    }

    /// Dashboard as seen at `now`
    pub async fn dashboard_at(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<DashboardView> {
        let since = now - Duration::days(i64::from(DASHBOARD_WINDOW_DAYS));
        let records = self.source.recent(owner, since).await?;
        debug!("Dashboard for {} over {} records", owner, records.len());

        let today = now.date_naive();
        Ok(DashboardView {
            summary: summarize(&records),
            last_7_days: bucket_by_day(&records, SHORT_SERIES_DAYS, today),
            last_30_days: bucket_by_day(&records, DASHBOARD_WINDOW_DAYS, today),
            synthetic: self.source.is_synthetic(),
        })
    }

    /// 1-based page of records, newest first; pages below 1 read as page 1
    pub async fn list(&self, owner: &OwnerId, page: i64) -> Result<EvaluationPage> {
        let current_page = u64::try_from(page).unwrap_or(0).max(1);
        let offset = (current_page - 1).saturating_mul(PAGE_SIZE);

        let total_count = self.source.count(owner).await?;
        let items = self.source.page(owner, offset, PAGE_SIZE).await?;

        Ok(EvaluationPage {
            items,
            current_page,
            total_pages: total_count.div_ceil(PAGE_SIZE),
            total_count,
            synthetic: self.source.is_synthetic(),
        })
    }

    /// One record, masked when the owner's policy asks for it
    pub async fn detail(&self, owner: &OwnerId, id: &EvaluationId) -> Result<EvaluationDetail> {
        let mut record = self
            .source
            .find(owner, id)
            .await?
            .ok_or_else(|| EvalError::NotFound(id.to_string()))?;

        let obfuscated = self.settings(owner).await?.obfuscate_pii;
        record.prompt = obfuscate_if(obfuscated, &record.prompt);
        record.response = obfuscate_if(obfuscated, &record.response);

        Ok(EvaluationDetail {
            record,
            obfuscated,
            synthetic: self.source.is_synthetic(),
        })
    }

    /// Stored settings, or the defaults if the owner never saved any
    pub async fn settings(&self, owner: &OwnerId) -> Result<EvaluationSettings> {
        Ok(self.storage.get_settings(owner).await?.unwrap_or_default())
    }

    pub async fn save_settings(
        &self,
        owner: &OwnerId,
        settings: EvaluationSettings,
    ) -> Result<EvaluationSettings> {
        validate_settings(&settings)?;
        let saved = self.storage.upsert_settings(owner, &settings).await?;
        info!("Settings updated for {}", owner);
        Ok(saved)
    }
}
