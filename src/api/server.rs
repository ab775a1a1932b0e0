//! HTTP API server

use super::error::ApiError;
use crate::auth::{require_owner, Authenticator, CurrentOwner};
use crate::dashboard::{DashboardService, DashboardView, EvaluationDetail, EvaluationPage};
use crate::ingest::IngestService;
use crate::source::EvaluationSource;
use crate::storage::StorageBackend;
use crate::types::{EvaluationId, EvaluationPayload, EvaluationRecord, EvaluationSettings};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 3000).into(),
        }
    }
}

/// Shared request state
#[derive(Clone)]
pub struct AppState {
    storage: Arc<dyn StorageBackend>,
    ingest: IngestService,
    dashboard: DashboardService,
}

impl AppState {
    /// Writes go to `storage`; dashboard reads go through `source`
    pub fn new(storage: Arc<dyn StorageBackend>, source: Arc<dyn EvaluationSource>) -> Self {
        Self {
            ingest: IngestService::new(storage.clone()),
            dashboard: DashboardService::new(source, storage.clone()),
            storage,
        }
    }
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    auth: Arc<Authenticator>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState, auth: Authenticator) -> Self {
        Self {
            config,
            state,
            auth: Arc::new(auth),
        }
    }

    /// Build router
    ///
    /// Everything under `/api` requires an owner; `/health` does not.
    pub fn build_router(state: AppState, auth: Arc<Authenticator>) -> Router {
        let owner_scoped = Router::new()
            .route("/api/evals/ingest", post(ingest_handler))
            .route("/api/dashboard", get(dashboard_handler))
            .route("/api/evaluations", get(list_handler))
            .route("/api/evaluations/:id", get(detail_handler))
            .route(
                "/api/settings",
                get(get_settings_handler).put(put_settings_handler),
            )
            .route_layer(middleware::from_fn_with_state(auth, require_owner));

        Router::new()
            .merge(owner_scoped)
            // Health check
            .route("/health", get(health_handler))
            // State
            .with_state(state)
            // Middleware
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until ctrl-c
    pub async fn serve(self) -> anyhow::Result<()> {
        let data_source = if self.state.dashboard.is_synthetic() {
            "synthetic"
        } else {
            "store"
        };
        let router = Self::build_router(self.state, self.auth);

        let listener = tokio::net::TcpListener::bind(self.config.addr).await?;
        info!(
            "API server listening on http://{} (dashboard source: {})",
            self.config.addr, data_source
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Successful ingestion body
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub data: EvaluationRecord,
}

async fn ingest_handler(
    State(state): State<AppState>,
    Extension(CurrentOwner(owner)): Extension<CurrentOwner>,
    payload: Result<Json<EvaluationPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let Json(payload) = payload?;
    let record = state.ingest.ingest(&owner, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            success: true,
            data: record,
        }),
    ))
}

async fn dashboard_handler(
    State(state): State<AppState>,
    Extension(CurrentOwner(owner)): Extension<CurrentOwner>,
) -> Result<Json<DashboardView>, ApiError> {
    Ok(Json(state.dashboard.dashboard(&owner).await?))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<String>,
}

/// Unparseable page numbers read as page 1
async fn list_handler(
    State(state): State<AppState>,
    Extension(CurrentOwner(owner)): Extension<CurrentOwner>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<EvaluationPage>, ApiError> {
    let Query(params) = params?;
    let page = params
        .page
        .and_then(|p| p.trim().parse::<i64>().ok())
        .unwrap_or(1);
    Ok(Json(state.dashboard.list(&owner, page).await?))
}

async fn detail_handler(
    State(state): State<AppState>,
    Extension(CurrentOwner(owner)): Extension<CurrentOwner>,
    Path(id): Path<String>,
) -> Result<Json<EvaluationDetail>, ApiError> {
    let id = EvaluationId(id);
    Ok(Json(state.dashboard.detail(&owner, &id).await?))
}

async fn get_settings_handler(
    State(state): State<AppState>,
    Extension(CurrentOwner(owner)): Extension<CurrentOwner>,
) -> Result<Json<EvaluationSettings>, ApiError> {
    Ok(Json(state.dashboard.settings(&owner).await?))
}

async fn put_settings_handler(
    State(state): State<AppState>,
    Extension(CurrentOwner(owner)): Extension<CurrentOwner>,
    settings: Result<Json<EvaluationSettings>, JsonRejection>,
) -> Result<Json<EvaluationSettings>, ApiError> {
    let Json(settings) = settings?;
    Ok(Json(state.dashboard.save_settings(&owner, settings).await?))
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub synthetic: bool,
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, label) = match state.storage.check_health().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            synthetic: state.dashboard.is_synthetic(),
        }),
    )
}
