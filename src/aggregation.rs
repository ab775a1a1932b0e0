//! KPI aggregation over evaluation records
//!
//! Pure transforms: no I/O, no hidden state. The same input slice always
//! yields the same output, so views can recompute on every request.
//!
//! # Success policy
//!
//! A record counts as successful unless its flags contain [`FAILED_FLAG`].
//! Records with no flags at all are therefore successes. Other flags such as
//! `unsafe_content` or `timeout` do not affect the success rate.

use crate::types::EvaluationRecord;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Flag that marks an evaluation as unsuccessful
pub const FAILED_FLAG: &str = "failed";

/// Success-by-default policy: only an explicit `failed` flag is a failure
pub fn is_successful(record: &EvaluationRecord) -> bool {
    !record.has_flag(FAILED_FLAG)
}

/// Headline KPIs for a set of records
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    pub count: usize,
    pub avg_latency_ms: f64,
    /// Percentage in [0, 100]
    pub success_rate: f64,
    pub avg_score: f64,
}

/// KPIs for a single calendar day (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub count: usize,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    latency_sum: f64,
    score_sum: f64,
    successes: usize,
}

impl Accumulator {
    fn push(&mut self, record: &EvaluationRecord) {
        self.count += 1;
        self.latency_sum += record.latency_ms as f64;
        self.score_sum += record.score;
        if is_successful(record) {
            self.successes += 1;
        }
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            sum / self.count as f64
        }
    }

    fn success_rate(&self) -> f64 {
        self.mean(self.successes as f64) * 100.0
    }
}

/// Summarize a set of records into count, mean latency, success rate and mean score
///
/// An empty slice yields all zeros.
pub fn summarize(records: &[EvaluationRecord]) -> KpiSummary {
    let mut acc = Accumulator::default();
    for record in records {
        acc.push(record);
    }

    KpiSummary {
        count: acc.count,
        avg_latency_ms: acc.mean(acc.latency_sum),
        success_rate: acc.success_rate(),
        avg_score: acc.mean(acc.score_sum),
    }
}

/// Bucket records into the `window_days` calendar days ending at `today`
///
/// Buckets are keyed by the UTC date of `created_at` and returned oldest
/// first. Days without records are included with zero values, so the result
/// always has exactly `window_days` entries. Records outside the window are
/// ignored.
pub fn bucket_by_day(
    records: &[EvaluationRecord],
    window_days: u32,
    today: NaiveDate,
) -> Vec<DayBucket> {
    let mut per_day: HashMap<NaiveDate, Accumulator> = HashMap::new();
    for record in records {
        per_day
            .entry(record.created_at.date_naive())
            .or_default()
            .push(record);
    }

    (0..window_days)
        .rev()
        .map(|days_ago| {
            let date = today - Duration::days(i64::from(days_ago));
            match per_day.get(&date) {
                Some(acc) => DayBucket {
                    date,
                    avg_latency_ms: acc.mean(acc.latency_sum),
                    success_rate: acc.success_rate(),
                    count: acc.count,
                },
                None => DayBucket {
                    date,
                    avg_latency_ms: 0.0,
                    success_rate: 0.0,
                    count: 0,
                },
            }
        })
        .collect()
}

/// `bucket_by_day` anchored at the current UTC date
pub fn bucket_by_day_now(records: &[EvaluationRecord], window_days: u32) -> Vec<DayBucket> {
    bucket_by_day(records, window_days, Utc::now().date_naive())
}
