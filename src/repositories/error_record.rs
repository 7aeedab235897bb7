//! # ErrorRecord Repository
//!
//! Repository operations for the error_records table. One row per
//! classified failure; operators resolve rows that required manual
//! intervention.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::classify::Classification;
use crate::models::error_record::{ActiveModel, Column, Entity, Model};

/// Repository for error record database operations
pub struct ErrorRecordRepository {
    db: DatabaseConnection,
}

impl ErrorRecordRepository {
    /// Create a new ErrorRecordRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Persist a classified failure against its message
    pub async fn create(
        &self,
        message_id: Uuid,
        classification: &Classification,
    ) -> Result<Model, DbErr> {
        let now = Utc::now().fixed_offset();

        let record = ActiveModel {
            id: Set(Uuid::new_v4()),
            message_id: Set(message_id),
            error_kind: Set(classification.kind.as_str().to_string()),
            severity: Set(classification.severity.as_str().to_string()),
            message: Set(classification.message.clone()),
            can_retry: Set(classification.can_retry),
            retry_delay_seconds: Set(classification.retry_delay_seconds as i64),
            requires_manual_intervention: Set(classification.requires_manual_intervention),
            resolved_at: Set(None),
            created_at: Set(now),
        };

        let result = record.insert(&self.db).await.map_err(|e| {
            tracing::error!(message_id = %message_id, "Failed to create error record: {}", e);
            e
        })?;

        Ok(result)
    }

    /// List error records, optionally only the unresolved ones
    pub async fn list(
        &self,
        unresolved_only: bool,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find().order_by_desc(Column::CreatedAt);

        if unresolved_only {
            query = query
                .filter(Column::ResolvedAt.is_null())
                .filter(Column::RequiresManualIntervention.eq(true));
        }

        query
            .offset(offset.unwrap_or(0))
            .limit(limit.unwrap_or(100))
            .all(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list error records: {}", e);
                e
            })
    }

    /// List failures recorded for one message
    pub async fn list_for_message(&self, message_id: Uuid) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::MessageId.eq(message_id))
            .order_by_asc(Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| {
                tracing::error!(message_id = %message_id, "Failed to list error records: {}", e);
                e
            })
    }

    /// Mark an error record resolved by an operator
    pub async fn resolve(&self, error_id: Uuid) -> Result<Option<Model>, DbErr> {
        let record = Entity::find_by_id(error_id).one(&self.db).await.map_err(|e| {
            tracing::error!(error_id = %error_id, "Failed to find error record: {}", e);
            e
        })?;

        let Some(record) = record else {
            return Ok(None);
        };

        let mut active: ActiveModel = record.into();
        active.resolved_at = Set(Some(Utc::now().fixed_offset()));

        let updated = active.update(&self.db).await.map_err(|e| {
            tracing::error!(error_id = %error_id, "Failed to resolve error record: {}", e);
            e
        })?;

        Ok(Some(updated))
    }
}
