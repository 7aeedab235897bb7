//! Database-backed implementation of the orchestrator's persistence seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::classify::Classification;
use crate::repositories::sync_lane::lane_from_model;
use crate::repositories::{ErrorRecordRepository, MessageRecordRepository, SyncLaneRepository};
use crate::sync::lane::{BackoffPolicy, HealthPolicy, LaneKey, SyncLane};
use crate::sync::store::{NewDispatch, StoreError, SyncStore};

/// SeaORM-backed [`SyncStore`]. Lane rows are rebuilt with the configured
/// policies since policies are process-wide, not per row.
pub struct DbSyncStore {
    lanes: SyncLaneRepository,
    messages: MessageRecordRepository,
    errors: ErrorRecordRepository,
    backoff: BackoffPolicy,
    health: HealthPolicy,
}

impl DbSyncStore {
    pub fn new(db: DatabaseConnection, backoff: BackoffPolicy, health: HealthPolicy) -> Self {
        Self {
            lanes: SyncLaneRepository::new(db.clone()),
            messages: MessageRecordRepository::new(db.clone()),
            errors: ErrorRecordRepository::new(db),
            backoff,
            health,
        }
    }
}

#[async_trait]
impl SyncStore for DbSyncStore {
    async fn load_lane(&self, key: &LaneKey) -> Result<Option<SyncLane>, StoreError> {
        let model = self.lanes.find_by_key(key).await?;
        match model {
            Some(model) => Ok(Some(lane_from_model(
                &model,
                self.backoff.clone(),
                self.health.clone(),
            )?)),
            None => Ok(None),
        }
    }

    async fn save_lane(&self, lane: &SyncLane) -> Result<(), StoreError> {
        self.lanes.upsert(lane).await?;
        Ok(())
    }

    async fn record_dispatch(&self, dispatch: &NewDispatch) -> Result<(), StoreError> {
        self.messages.create_outbound(dispatch).await?;
        Ok(())
    }

    async fn mark_message_outcome(
        &self,
        message_id: Uuid,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.messages.mark_outcome(message_id, success, at).await?;
        Ok(())
    }

    async fn record_error(
        &self,
        message_id: Uuid,
        classification: &Classification,
    ) -> Result<(), StoreError> {
        self.errors.create(message_id, classification).await?;
        Ok(())
    }
}
