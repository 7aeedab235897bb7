//! # Message Record API Handlers
//!
//! This module contains handlers for auditing dispatched messages and
//! attaching operator resolution notes to them.

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorType, validation_error};
use crate::models::message_record;
use crate::repositories::MessageRecordRepository;
use crate::server::AppState;
use crate::sync::lane::MessageKind;

/// Query parameters for listing message records
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    /// Hotel property identifier
    pub property_id: Option<String>,
    /// Narrow to one message family
    pub kind: Option<String>,
    /// Maximum number of records to return (default: 100, max: 500)
    pub limit: Option<u64>,
    /// Number of records to skip
    pub offset: Option<u64>,
}

/// Message record response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageRecordInfo {
    /// Globally unique message identifier
    pub id: String,
    /// Hotel property identifier
    pub property_id: String,
    /// Message family
    #[schema(example = "inventory")]
    pub message_kind: String,
    /// Message direction
    #[schema(example = "outbound")]
    pub direction: String,
    /// Stable content hash of the serialized payload
    pub content_fingerprint: String,
    /// Processing state
    #[schema(example = "processed")]
    pub processing_state: String,
    /// First message seen with the same fingerprint, for duplicates
    pub duplicate_of: Option<String>,
    /// Operator note attached after terminal processing
    pub resolution_note: Option<String>,
    /// Timestamp when the message was sent to the partner
    pub sent_at: Option<String>,
    /// Timestamp when processing finished
    pub processed_at: Option<String>,
    /// Timestamp when the record was created
    pub created_at: String,
}

impl From<message_record::Model> for MessageRecordInfo {
    fn from(model: message_record::Model) -> Self {
        Self {
            id: model.id.to_string(),
            property_id: model.property_id,
            message_kind: model.message_kind,
            direction: model.direction,
            content_fingerprint: model.content_fingerprint,
            processing_state: model.processing_state,
            duplicate_of: model.duplicate_of.map(|id| id.to_string()),
            resolution_note: model.resolution_note,
            sent_at: model.sent_at.map(|dt| dt.to_rfc3339()),
            processed_at: model.processed_at.map(|dt| dt.to_rfc3339()),
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

/// Response payload for message record listing
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessagesResponse {
    /// Message records matching the query, newest first
    pub messages: Vec<MessageRecordInfo>,
}

/// Request body for attaching a resolution note
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnnotateRequest {
    /// Operator note explaining how the message was resolved
    pub note: String,
}

/// List dispatched messages for a property
#[utoipa::path(
    get,
    path = "/messages",
    params(
        ("property_id" = String, Query, description = "Hotel property identifier"),
        ("kind" = Option<String>, Query, description = "Narrow to one message family"),
        ("limit" = Option<u64>, Query, description = "Maximum number of records to return (default 100, max 500)"),
        ("offset" = Option<u64>, Query, description = "Number of records to skip")
    ),
    responses(
        (status = 200, description = "Message records matching the query", body = MessagesResponse),
        (status = 400, description = "Invalid query parameters", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "messages"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(params): Query<ListMessagesQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let Some(property_id) = params.property_id.as_deref() else {
        return Err(validation_error(
            "Missing property_id",
            serde_json::json!({
                "property_id": "Property id is required"
            }),
        ));
    };

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

    if let Some(kind) = params.kind.as_deref()
        && kind.parse::<MessageKind>().is_err()
    {
        return Err(validation_error(
            "Invalid kind",
            serde_json::json!({
                "kind": "Unknown message kind"
            }),
        ));
    }

    let repo = MessageRecordRepository::new(state.db.clone());
    let models = repo
        .list_for_property(
            property_id,
            params.kind.as_deref(),
            params.limit,
            params.offset,
        )
        .await?;

    Ok(Json(MessagesResponse {
        messages: models.into_iter().map(MessageRecordInfo::from).collect(),
    }))
}

/// Attach a resolution note to a message
#[utoipa::path(
    post,
    path = "/messages/{id}/annotate",
    params(
        ("id" = String, Path, description = "Message identifier (UUID)")
    ),
    request_body = AnnotateRequest,
    responses(
        (status = 200, description = "Note attached to the message", body = MessageRecordInfo),
        (status = 400, description = "Invalid identifier or note", body = ApiError),
        (status = 404, description = "Message not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    tag = "messages"
)]
pub async fn annotate_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnnotateRequest>,
) -> Result<Json<MessageRecordInfo>, ApiError> {
    let message_id = Uuid::parse_str(&id).map_err(|_| {
        validation_error(
            "Invalid id",
            serde_json::json!({
                "id": "Must be a valid UUID"
            }),
        )
    })?;

    if body.note.trim().is_empty() {
        return Err(validation_error(
            "Invalid note",
            serde_json::json!({
                "note": "Note must not be empty"
            }),
        ));
    }

    let repo = MessageRecordRepository::new(state.db.clone());
    let model = repo
        .annotate(message_id, body.note.trim())
        .await?
        .ok_or_else(|| ApiError::from(ErrorType::NotFound))?;

    Ok(Json(MessageRecordInfo::from(model)))
}
