//! Core data types for the agent evaluation service
//!
//! Evaluation records, ingestion payloads, owner identities and the per-owner
//! settings policy. These types are shared by the store, the ingestion path
//! and the dashboard views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for evaluation records
///
/// Generated as a UUID v4 at insert time. Kept as a string so that records
/// from the synthetic source (`mock-<n>-<m>`) share the same type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationId(pub String);

impl EvaluationId {
    /// Create a new random evaluation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EvaluationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EvaluationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of the authenticated principal that owns records
///
/// Resolved by the external identity provider and passed explicitly into
/// every core operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored, scored agent interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: EvaluationId,
    pub owner_id: OwnerId,
    pub interaction_id: String,
    pub prompt: String,
    pub response: String,
    /// Quality score in [0, 1]
    pub score: f64,
    pub latency_ms: u64,
    /// Free-form labels such as `failed` or `unsafe_content`; order kept, duplicates allowed
    pub flags: Vec<String>,
    pub pii_tokens_redacted: u32,
    pub created_at: DateTime<Utc>,
}

impl EvaluationRecord {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Ingestion request body
///
/// Every field is optional at the wire level so that presence checks are
/// reported as validation errors instead of decode failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationPayload {
    pub interaction_id: Option<String>,
    pub prompt: Option<String>,
    pub response: Option<String>,
    pub score: Option<f64>,
    pub latency_ms: Option<i64>,
    pub flags: Option<Vec<String>>,
    pub pii_tokens_redacted: Option<u32>,
}

/// When evaluations should run for an owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPolicy {
    #[default]
    Always,
    Sampled,
}

impl std::fmt::Display for RunPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPolicy::Always => write!(f, "always"),
            RunPolicy::Sampled => write!(f, "sampled"),
        }
    }
}

impl FromStr for RunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "always" => Ok(RunPolicy::Always),
            "sampled" => Ok(RunPolicy::Sampled),
            other => Err(format!("unknown run policy: {}", other)),
        }
    }
}

/// Per-owner sampling and redaction policy (upsert semantics, last write wins)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSettings {
    pub run_policy: RunPolicy,
    pub sample_rate_pct: u8,
    pub obfuscate_pii: bool,
    pub max_eval_per_day: u32,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            run_policy: RunPolicy::Always,
            sample_rate_pct: 100,
            obfuscate_pii: false,
            max_eval_per_day: 1000,
        }
    }
}
