//! # SyncLane Repository
//!
//! Repository operations for the sync_lanes table. Rows are upserted by
//! their (property_id, message_kind) key, one per lane. The sliding outcome
//! window is deliberately not persisted: after a restart a lane resumes
//! with an empty window and re-earns its degradation verdict.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::models::sync_lane::{ActiveModel, Column, Entity, Model};
use crate::sync::lane::{BackoffPolicy, HealthPolicy, LaneKey, SyncLane};

/// Repository for sync lane database operations
pub struct SyncLaneRepository {
    db: DatabaseConnection,
}

impl SyncLaneRepository {
    /// Create a new SyncLaneRepository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Find the lane row for a key
    pub async fn find_by_key(&self, key: &LaneKey) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::PropertyId.eq(key.property_id.as_str()))
            .filter(Column::MessageKind.eq(key.kind.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| {
                tracing::error!(lane = %key, "Failed to find sync lane: {}", e);
                e
            })
    }

    /// Insert or update the snapshot for a lane, keyed by (property, kind)
    pub async fn upsert(&self, lane: &SyncLane) -> Result<Model, DbErr> {
        let now = Utc::now().fixed_offset();
        let existing = self.find_by_key(&lane.key).await?;

        let result = match existing {
            Some(model) => {
                let mut active: ActiveModel = model.into();
                apply_snapshot(&mut active, lane);
                active.updated_at = Set(now);
                active.update(&self.db).await
            }
            None => {
                let mut active = ActiveModel {
                    id: Set(Uuid::new_v4()),
                    property_id: Set(lane.key.property_id.clone()),
                    message_kind: Set(lane.key.kind.as_str().to_string()),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                apply_snapshot(&mut active, lane);
                active.insert(&self.db).await
            }
        }
        .map_err(|e| {
            tracing::error!(lane = %lane.key, "Failed to upsert sync lane: {}", e);
            e
        })?;

        Ok(result)
    }

    /// List all lanes, optionally narrowed to one property
    pub async fn list(&self, property_id: Option<&str>) -> Result<Vec<Model>, DbErr> {
        let mut query = Entity::find()
            .order_by_asc(Column::PropertyId)
            .order_by_asc(Column::MessageKind);

        if let Some(property) = property_id {
            query = query.filter(Column::PropertyId.eq(property));
        }

        query.all(&self.db).await.map_err(|e| {
            tracing::error!("Failed to list sync lanes: {}", e);
            e
        })
    }

    /// Lanes whose scheduled retry time has passed and which still allow
    /// automatic retries. The scheduler redispatches these. Degraded lanes
    /// keep their scheduled wake-up, so they are polled here too.
    pub async fn find_due_retries(&self) -> Result<Vec<Model>, DbErr> {
        let now = Utc::now().fixed_offset();
        Entity::find()
            .filter(Column::State.is_in(["retry_pending", "degraded"]))
            .filter(Column::AutoRetryEnabled.eq(true))
            .filter(Column::NextRetryAt.lte(now))
            .order_by_asc(Column::NextRetryAt)
            .all(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to find due retries: {}", e);
                e
            })
    }
}

fn apply_snapshot(active: &mut ActiveModel, lane: &SyncLane) {
    active.state = Set(lane.state.as_str().to_string());
    active.records_total = Set(lane.records_total as i32);
    active.records_processed = Set(lane.records_processed as i32);
    active.retry_count = Set(lane.retry_count as i32);
    active.max_retries = Set(lane.max_retries as i32);
    active.consecutive_failures = Set(lane.consecutive_failures as i32);
    active.auto_retry_enabled = Set(lane.auto_retry_enabled);
    active.last_error = Set(lane.last_error.clone());
    active.last_attempt_at = Set(lane.last_attempt_at.map(|t| t.fixed_offset()));
    active.last_success_at = Set(lane.last_success_at.map(|t| t.fixed_offset()));
    active.next_retry_at = Set(lane.next_retry_at.map(|t| t.fixed_offset()));
}

/// Rebuild the in-memory lane from a persisted snapshot. Policies are not
/// stored per row; the caller supplies the configured ones.
pub fn lane_from_model(
    model: &Model,
    backoff: BackoffPolicy,
    health: HealthPolicy,
) -> Result<SyncLane, DbErr> {
    let kind = model
        .message_kind
        .parse()
        .map_err(|e: String| DbErr::Custom(format!("corrupt sync lane row: {e}")))?;
    let state = model
        .state
        .parse()
        .map_err(|e: String| DbErr::Custom(format!("corrupt sync lane row: {e}")))?;

    let mut lane = SyncLane::with_policies(
        LaneKey::new(model.property_id.clone(), kind),
        backoff,
        health,
        model.max_retries.max(0) as u32,
    );
    lane.state = state;
    lane.records_total = model.records_total.max(0) as u32;
    lane.records_processed = model.records_processed.max(0) as u32;
    lane.retry_count = model.retry_count.max(0) as u32;
    lane.consecutive_failures = model.consecutive_failures.max(0) as u32;
    lane.auto_retry_enabled = model.auto_retry_enabled;
    lane.last_error = model.last_error.clone();
    lane.last_attempt_at = model.last_attempt_at.map(|t| t.to_utc());
    lane.last_success_at = model.last_success_at.map(|t| t.to_utc());
    lane.next_retry_at = model.next_retry_at.map(|t| t.to_utc());
    Ok(lane)
}
