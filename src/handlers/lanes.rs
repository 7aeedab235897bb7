//! # Lane API Handlers
//!
//! This module contains handlers for inspecting and managing synchronization
//! lanes. The health score is recomputed from the persisted snapshot on
//! every read.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, ErrorType, validation_error};
use crate::models::sync_lane;
use crate::repositories::SyncLaneRepository;
use crate::repositories::sync_lane::lane_from_model;
use crate::server::AppState;
use crate::sync::lane::MessageKind;

/// Query parameters for listing lanes
#[derive(Debug, Deserialize)]
pub struct ListLanesQuery {
    /// Filter by hotel property identifier
    pub property_id: Option<String>,
}

/// Lane information response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LaneInfo {
    /// Hotel property identifier
    #[schema(example = "42")]
    pub property_id: String,
    /// Message family this lane synchronizes
    #[schema(example = "inventory")]
    pub message_kind: String,
    /// Current lifecycle state
    #[schema(example = "retry_pending")]
    pub state: String,
    /// Records registered for synchronization
    pub records_total: i32,
    /// Records confirmed processed
    pub records_processed: i32,
    /// Retry attempts consumed for the current failure streak
    pub retry_count: i32,
    /// Retry budget before the lane fails terminally
    pub max_retries: i32,
    /// Failures since the last success
    pub consecutive_failures: i32,
    /// Whether the scheduler may wake this lane automatically
    pub auto_retry_enabled: bool,
    /// Derived health indicator, 0..=100
    #[schema(example = 85.0)]
    pub health_score: f64,
    /// Most recent classified failure message
    pub last_error: Option<String>,
    /// Timestamp of the most recent dispatch attempt
    pub last_attempt_at: Option<String>,
    /// Timestamp of the most recent successful outcome
    pub last_success_at: Option<String>,
    /// Advisory wake-up time for the next retry
    pub next_retry_at: Option<String>,
}

/// Response payload for lane listing endpoints
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LanesResponse {
    /// Lanes matching the query
    pub lanes: Vec<LaneInfo>,
}

fn lane_info(state: &AppState, model: sync_lane::Model) -> Result<LaneInfo, ApiError> {
    let lane = lane_from_model(
        &model,
        state.config.retry_policy.backoff_policy(),
        state.config.health_policy.health_policy(),
    )?;
    Ok(LaneInfo {
        property_id: model.property_id,
        message_kind: model.message_kind,
        state: model.state,
        records_total: model.records_total,
        records_processed: model.records_processed,
        retry_count: model.retry_count,
        max_retries: model.max_retries,
        consecutive_failures: model.consecutive_failures,
        auto_retry_enabled: model.auto_retry_enabled,
        health_score: lane.health_score(Utc::now()),
        last_error: model.last_error,
        last_attempt_at: model.last_attempt_at.map(|dt| dt.to_rfc3339()),
        last_success_at: model.last_success_at.map(|dt| dt.to_rfc3339()),
        next_retry_at: model.next_retry_at.map(|dt| dt.to_rfc3339()),
    })
}

fn parse_kind(raw: &str) -> Result<MessageKind, ApiError> {
    raw.parse().map_err(|_| {
        validation_error(
            "Invalid message kind",
            serde_json::json!({
                "kind": "Must be one of: inventory, rates, reservations, restrictions, group_blocks"
            }),
        )
    })
}

/// List synchronization lanes
#[utoipa::path(
    get,
    path = "/lanes",
    params(
        ("property_id" = Option<String>, Query, description = "Filter by hotel property identifier")
    ),
    responses(
        (status = 200, description = "Lanes matching the query", body = LanesResponse),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "lanes"
)]
pub async fn list_lanes(
    State(state): State<AppState>,
    Query(params): Query<ListLanesQuery>,
) -> Result<Json<LanesResponse>, ApiError> {
    let repo = SyncLaneRepository::new(state.db.clone());
    let models = repo.list(params.property_id.as_deref()).await?;

    let lanes = models
        .into_iter()
        .map(|model| lane_info(&state, model))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(LanesResponse { lanes }))
}

/// Get one lane by property and message kind
#[utoipa::path(
    get,
    path = "/lanes/{property_id}/{kind}",
    params(
        ("property_id" = String, Path, description = "Hotel property identifier"),
        ("kind" = String, Path, description = "Message kind (e.g. inventory, rates)")
    ),
    responses(
        (status = 200, description = "Lane snapshot with recomputed health score", body = LaneInfo),
        (status = 400, description = "Invalid message kind", body = ApiError),
        (status = 404, description = "Lane not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "lanes"
)]
pub async fn get_lane(
    State(state): State<AppState>,
    Path((property_id, kind)): Path<(String, String)>,
) -> Result<Json<LaneInfo>, ApiError> {
    let kind = parse_kind(&kind)?;
    let repo = SyncLaneRepository::new(state.db.clone());
    let model = repo
        .find_by_key(&crate::sync::lane::LaneKey::new(property_id, kind))
        .await?
        .ok_or_else(|| ApiError::from(ErrorType::NotFound))?;

    Ok(Json(lane_info(&state, model)?))
}

/// Response payload for a lane reset
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResetResponse {
    /// Lane state after the reset
    #[schema(example = "pending")]
    pub state: String,
}

/// Manually reset a failed or retry-pending lane
#[utoipa::path(
    post,
    path = "/lanes/{property_id}/{kind}/reset",
    params(
        ("property_id" = String, Path, description = "Hotel property identifier"),
        ("kind" = String, Path, description = "Message kind (e.g. inventory, rates)")
    ),
    responses(
        (status = 200, description = "Lane reset to pending with a fresh retry budget", body = ResetResponse),
        (status = 400, description = "Invalid message kind", body = ApiError),
        (status = 404, description = "Lane not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "lanes"
)]
pub async fn reset_lane(
    State(state): State<AppState>,
    Path((property_id, kind)): Path<(String, String)>,
) -> Result<Json<ResetResponse>, ApiError> {
    let kind = parse_kind(&kind)?;

    // The orchestrator owns the in-memory lane; resetting through it keeps
    // the cached copy and the database row in step.
    let repo = SyncLaneRepository::new(state.db.clone());
    if repo
        .find_by_key(&crate::sync::lane::LaneKey::new(property_id.clone(), kind))
        .await?
        .is_none()
    {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Lane not found",
        ));
    }

    let new_state = state.orchestrator.manual_reset(&property_id, kind).await?;
    Ok(Json(ResetResponse {
        state: new_state.as_str().to_string(),
    }))
}

/// Lanes whose retry wake-up time has passed
#[utoipa::path(
    get,
    path = "/lanes/due-retries",
    responses(
        (status = 200, description = "Lanes eligible for redispatch", body = LanesResponse),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "lanes"
)]
pub async fn list_due_retries(
    State(state): State<AppState>,
) -> Result<Json<LanesResponse>, ApiError> {
    let repo = SyncLaneRepository::new(state.db.clone());
    let models = repo.find_due_retries().await?;

    let lanes = models
        .into_iter()
        .map(|model| lane_info(&state, model))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(LanesResponse { lanes }))
}
