//! # Server Configuration
//!
//! This module contains the server setup and configuration for the
//! ChannelSync API.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::dedup::InMemoryDedupCache;
use crate::handlers;
use crate::repositories::DbSyncStore;
use crate::sync::orchestrator::{OrchestratorPolicy, SyncOrchestrator};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub config: AppConfig,
}

/// Builds the orchestrator from configuration, wired to the database-backed
/// store and an in-memory deduplication ledger.
pub fn build_orchestrator(config: &AppConfig, db: DatabaseConnection) -> SyncOrchestrator {
    let backoff = config.retry_policy.backoff_policy();
    let health = config.health_policy.health_policy();
    let store = Arc::new(DbSyncStore::new(db, backoff.clone(), health.clone()));
    let dedup = Arc::new(InMemoryDedupCache::new(
        config.dedup.capacity,
        config.dedup.ttl_seconds,
    ));
    SyncOrchestrator::new(
        store,
        dedup,
        OrchestratorPolicy {
            max_retries: config.retry_policy.max_retries,
            backoff,
            health,
        },
    )
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/lanes", get(handlers::lanes::list_lanes))
        .route("/lanes/due-retries", get(handlers::lanes::list_due_retries))
        .route(
            "/lanes/{property_id}/{kind}",
            get(handlers::lanes::get_lane),
        )
        .route(
            "/lanes/{property_id}/{kind}/reset",
            post(handlers::lanes::reset_lane),
        )
        .route("/errors", get(handlers::errors::list_errors))
        .route("/errors/{id}/resolve", post(handlers::errors::resolve_error))
        .route("/messages", get(handlers::messages::list_messages))
        .route(
            "/messages/{id}/annotate",
            post(handlers::messages::annotate_message),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(
            crate::telemetry::trace_context_middleware,
        ))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(
    config: AppConfig,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = Arc::new(build_orchestrator(&config, db.clone()));
    let addr = config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;
    let profile = config.profile.clone();

    let state = AppState {
        db,
        orchestrator,
        config,
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, %profile, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::lanes::list_lanes,
        crate::handlers::lanes::get_lane,
        crate::handlers::lanes::reset_lane,
        crate::handlers::lanes::list_due_retries,
        crate::handlers::errors::list_errors,
        crate::handlers::errors::resolve_error,
        crate::handlers::messages::list_messages,
        crate::handlers::messages::annotate_message,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::handlers::lanes::LaneInfo,
            crate::handlers::lanes::LanesResponse,
            crate::handlers::lanes::ResetResponse,
            crate::handlers::errors::ErrorRecordInfo,
            crate::handlers::errors::ErrorsResponse,
            crate::handlers::messages::MessageRecordInfo,
            crate::handlers::messages::MessagesResponse,
            crate::handlers::messages::AnnotateRequest,
            crate::error::ApiError,
        )
    ),
    info(
        title = "ChannelSync API",
        description = "Synchronization orchestration between the hotel PMS and the distribution network",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
