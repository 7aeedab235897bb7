//! Persistence seam between the orchestrator and the repository layer.
//!
//! The orchestrator mutates lanes in memory and pushes snapshots through
//! this trait after every transition. Tests that only care about the state
//! machine use [`NullStore`]; the database-backed implementation lives in
//! `repositories::store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::classify::Classification;
use crate::sync::lane::{LaneKey, SyncLane};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// New outbound message to be recorded at dispatch time.
#[derive(Debug, Clone)]
pub struct NewDispatch {
    pub message_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub batch_id: Option<Uuid>,
    pub key: LaneKey,
    pub content_fingerprint: String,
    /// First message seen with this fingerprint, when this is a repeat.
    pub duplicate_of: Option<Uuid>,
    pub sent_at: DateTime<Utc>,
}

#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Load the persisted lane for a key, if one exists.
    async fn load_lane(&self, key: &LaneKey) -> Result<Option<SyncLane>, StoreError>;

    /// Persist the lane snapshot after a transition (upsert by key).
    async fn save_lane(&self, lane: &SyncLane) -> Result<(), StoreError>;

    /// Record an outbound message at dispatch time.
    async fn record_dispatch(&self, dispatch: &NewDispatch) -> Result<(), StoreError>;

    /// Move a message record to its terminal processing state.
    async fn mark_message_outcome(
        &self,
        message_id: Uuid,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Persist a classified failure against its message.
    async fn record_error(
        &self,
        message_id: Uuid,
        classification: &Classification,
    ) -> Result<(), StoreError>;
}

/// No-op store for exercising orchestration logic without a database.
#[derive(Debug, Default)]
pub struct NullStore;

#[async_trait]
impl SyncStore for NullStore {
    async fn load_lane(&self, _key: &LaneKey) -> Result<Option<SyncLane>, StoreError> {
        Ok(None)
    }

    async fn save_lane(&self, _lane: &SyncLane) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_dispatch(&self, _dispatch: &NewDispatch) -> Result<(), StoreError> {
        Ok(())
    }

    async fn mark_message_outcome(
        &self,
        _message_id: Uuid,
        _success: bool,
        _at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn record_error(
        &self,
        _message_id: Uuid,
        _classification: &Classification,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}
