//! Input validation for ingestion payloads and settings
//!
//! Checks run in a fixed order and the first failing stage wins:
//! presence of required fields, then score range, then latency sign.

use crate::error::{EvalError, Result};
use crate::types::{EvaluationPayload, EvaluationSettings};

/// Payload fields after validation, ready to become a record
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPayload {
    pub interaction_id: String,
    pub prompt: String,
    pub response: String,
    pub score: f64,
    pub latency_ms: u64,
    pub flags: Vec<String>,
    pub pii_tokens_redacted: u32,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

/// Collect the names of required fields that are absent or empty
///
/// `latency_ms = 0` counts as present.
pub fn missing_fields(payload: &EvaluationPayload) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if is_blank(&payload.interaction_id) {
        missing.push("interaction_id");
    }
    if is_blank(&payload.prompt) {
        missing.push("prompt");
    }
    if is_blank(&payload.response) {
        missing.push("response");
    }
    if payload.score.is_none() {
        missing.push("score");
    }
    if payload.latency_ms.is_none() {
        missing.push("latency_ms");
    }
    missing
}

/// Closed-interval check on a score
pub fn is_valid_score(score: f64) -> bool {
    (0.0..=1.0).contains(&score)
}

/// Validate an ingestion payload
pub fn validate_payload(payload: EvaluationPayload) -> Result<ValidatedPayload> {
    let missing = missing_fields(&payload);
    let (interaction_id, prompt, response, score, latency_ms) = match (
        payload.interaction_id,
        payload.prompt,
        payload.response,
        payload.score,
        payload.latency_ms,
    ) {
        (Some(i), Some(p), Some(r), Some(s), Some(l)) if missing.is_empty() => (i, p, r, s, l),
        _ => return Err(EvalError::MissingField(missing)),
    };

    if !is_valid_score(score) {
        return Err(EvalError::InvalidScore);
    }

    let latency_ms = u64::try_from(latency_ms).map_err(|_| EvalError::InvalidLatency)?;

    Ok(ValidatedPayload {
        interaction_id,
        prompt,
        response,
        score,
        latency_ms,
        flags: payload.flags.unwrap_or_default(),
        pii_tokens_redacted: payload.pii_tokens_redacted.unwrap_or(0),
    })
}

/// Validate a settings document before it is written
pub fn validate_settings(settings: &EvaluationSettings) -> Result<()> {
    if settings.sample_rate_pct > 100 {
        return Err(EvalError::InvalidSettings(format!(
            "sample_rate_pct must be between 0 and 100, got {}",
            settings.sample_rate_pct
        )));
    }
    Ok(())
}
