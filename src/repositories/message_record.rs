//! # MessageRecord Repository
//!
//! Repository operations for the message_records table. Records are
//! append-mostly: created at dispatch time, moved to a terminal processing
//! state once the outcome is known.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::models::message_record::{ActiveModel, Column, Entity, Model};
use crate::sync::store::NewDispatch;

/// Repository for message record database operations
pub struct MessageRecordRepository {
    db: DatabaseConnection,
}

impl MessageRecordRepository {
    /// Create a new MessageRecordRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Record a new outbound message at dispatch time
    pub async fn create_outbound(&self, dispatch: &NewDispatch) -> Result<Model, DbErr> {
        let now = Utc::now().fixed_offset();

        let record = ActiveModel {
            id: Set(dispatch.message_id),
            parent_id: Set(dispatch.parent_id),
            batch_id: Set(dispatch.batch_id),
            property_id: Set(dispatch.key.property_id.clone()),
            message_kind: Set(dispatch.key.kind.as_str().to_string()),
            direction: Set("outbound".to_string()),
            content_fingerprint: Set(dispatch.content_fingerprint.clone()),
            processing_state: Set("sent".to_string()),
            duplicate_of: Set(dispatch.duplicate_of),
            resolution_note: Set(None),
            sent_at: Set(Some(dispatch.sent_at.fixed_offset())),
            received_at: Set(None),
            processed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = record.insert(&self.db).await.map_err(|e| {
            tracing::error!(message_id = %dispatch.message_id, "Failed to create message record: {}", e);
            e
        })?;

        Ok(result)
    }

    /// Find a message record by its globally unique id
    pub async fn find_by_id(&self, message_id: Uuid) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(message_id).one(&self.db).await.map_err(|e| {
            tracing::error!(message_id = %message_id, "Failed to find message record: {}", e);
            e
        })
    }

    /// Move a message to its terminal processing state
    pub async fn mark_outcome(
        &self,
        message_id: Uuid,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<Option<Model>, DbErr> {
        let Some(record) = self.find_by_id(message_id).await? else {
            tracing::warn!(message_id = %message_id, "Outcome reported for unknown message");
            return Ok(None);
        };

        let mut active: ActiveModel = record.into();
        active.processing_state = Set(if success { "processed" } else { "failed" }.to_string());
        active.processed_at = Set(Some(at.fixed_offset()));
        active.updated_at = Set(Utc::now().fixed_offset());

        let updated = active.update(&self.db).await.map_err(|e| {
            tracing::error!(message_id = %message_id, "Failed to mark message outcome: {}", e);
            e
        })?;

        Ok(Some(updated))
    }

    /// Attach an operator note to a processed message
    pub async fn annotate(
        &self,
        message_id: Uuid,
        note: &str,
    ) -> Result<Option<Model>, DbErr> {
        let Some(record) = self.find_by_id(message_id).await? else {
            return Ok(None);
        };

        let mut active: ActiveModel = record.into();
        active.resolution_note = Set(Some(note.to_string()));
        active.updated_at = Set(Utc::now().fixed_offset());

        let updated = active.update(&self.db).await.map_err(|e| {
            tracing::error!(message_id = %message_id, "Failed to annotate message record: {}", e);
            e
        })?;

        Ok(Some(updated))
    }

    /// List messages for a property, newest first
    pub async fn list_for_property(
        &self,
        property_id: &str,
        message_kind: Option<&str>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find()
            .filter(Column::PropertyId.eq(property_id))
            .order_by_desc(Column::CreatedAt);

        if let Some(kind) = message_kind {
            query = query.filter(Column::MessageKind.eq(kind));
        }

        query
            .offset(offset.unwrap_or(0))
            .limit(limit.unwrap_or(100))
            .all(&self.db)
            .await
            .map_err(|e| {
                tracing::error!(property_id = %property_id, "Failed to list message records: {}", e);
                e
            })
    }
}
