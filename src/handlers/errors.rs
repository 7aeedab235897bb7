//! # Error Record API Handlers
//!
//! This module contains handlers for reviewing classified failures and
//! resolving the ones that required manual intervention.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorType, validation_error};
use crate::models::error_record;
use crate::repositories::ErrorRecordRepository;
use crate::server::AppState;

/// Query parameters for listing error records
#[derive(Debug, Deserialize)]
pub struct ListErrorsQuery {
    /// Only return unresolved records requiring manual intervention
    pub unresolved: Option<bool>,
    /// Maximum number of records to return (default: 100, max: 500)
    pub limit: Option<u64>,
    /// Number of records to skip
    pub offset: Option<u64>,
}

/// Error record response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRecordInfo {
    /// Unique identifier of the error record
    pub id: String,
    /// Message this failure belongs to
    pub message_id: String,
    /// Classified error kind
    #[schema(example = "authentication")]
    pub error_kind: String,
    /// Severity derived from the kind
    #[schema(example = "critical")]
    pub severity: String,
    /// Human-readable failure message
    pub message: String,
    /// Whether automatic retry is worthwhile
    pub can_retry: bool,
    /// Recommended retry delay in seconds
    pub retry_delay_seconds: i64,
    /// Whether an operator must act before the lane can make progress
    pub requires_manual_intervention: bool,
    /// Timestamp when an operator resolved this failure
    pub resolved_at: Option<String>,
    /// Timestamp when the failure was classified
    pub created_at: String,
}

impl From<error_record::Model> for ErrorRecordInfo {
    fn from(model: error_record::Model) -> Self {
        Self {
            id: model.id.to_string(),
            message_id: model.message_id.to_string(),
            error_kind: model.error_kind,
            severity: model.severity,
            message: model.message,
            can_retry: model.can_retry,
            retry_delay_seconds: model.retry_delay_seconds,
            requires_manual_intervention: model.requires_manual_intervention,
            resolved_at: model.resolved_at.map(|dt| dt.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

/// Response payload for error record listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorsResponse {
    /// Error records matching the query
    pub errors: Vec<ErrorRecordInfo>,
}

/// List classified failures
#[utoipa::path(
    get,
    path = "/errors",
    params(
        ("unresolved" = Option<bool>, Query, description = "Only unresolved records requiring manual intervention"),
        ("limit" = Option<u64>, Query, description = "Maximum number of records to return (default 100, max 500)"),
        ("offset" = Option<u64>, Query, description = "Number of records to skip")
    ),
    responses(
        (status = 200, description = "Error records matching the query", body = ErrorsResponse),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "errors"
)]
pub async fn list_errors(
    State(state): State<AppState>,
    Query(params): Query<ListErrorsQuery>,
) -> Result<Json<ErrorsResponse>, ApiError> {
    if let Some(limit) = params.limit
        && (limit == 0 || limit > 500)
    {
        return Err(validation_error(
            "Invalid limit",
            serde_json::json!({
                "limit": "Must be between 1 and 500"
            }),
        ));
    }

    let repo = ErrorRecordRepository::new(state.db.clone());
    let models = repo
        .list(params.unresolved.unwrap_or(false), params.limit, params.offset)
        .await?;

    Ok(Json(ErrorsResponse {
        errors: models.into_iter().map(ErrorRecordInfo::from).collect(),
    }))
}

/// Mark an error record resolved
#[utoipa::path(
    post,
    path = "/errors/{id}/resolve",
    params(
        ("id" = String, Path, description = "Error record identifier (UUID)")
    ),
    responses(
        (status = 200, description = "Error record marked resolved", body = ErrorRecordInfo),
        (status = 400, description = "Invalid identifier", body = ApiError),
        (status = 404, description = "Error record not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "errors"
)]
pub async fn resolve_error(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ErrorRecordInfo>, ApiError> {
    let error_id = Uuid::parse_str(&id).map_err(|_| {
        validation_error(
            "Invalid id",
            serde_json::json!({
                "id": "Must be a valid UUID"
            }),
        )
    })?;

    let repo = ErrorRecordRepository::new(state.db.clone());
    let model = repo
        .resolve(error_id)
        .await?
        .ok_or_else(|| ApiError::from(ErrorType::NotFound))?;

    Ok(Json(ErrorRecordInfo::from(model)))
}
