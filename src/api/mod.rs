//! HTTP API for ingestion and the dashboard views
//!
//! Provides:
//! - `POST /api/evals/ingest` for agents reporting evaluations
//! - Owner-scoped dashboard, listing, detail and settings endpoints
//! - An unauthenticated health check

pub mod error;
pub mod server;

pub use error::{ApiError, ErrorBody};
pub use server::{ApiServer, ApiServerConfig, AppState};
