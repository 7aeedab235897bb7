//! SyncLane entity model
//!
//! This module contains the SeaORM entity model for the sync_lanes table.
//! One row per (property, message kind) pair; the row is the persisted
//! snapshot of the in-memory state machine, and the health score is
//! deliberately absent because it is recomputed on read.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// SyncLane entity representing one synchronization lane
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_lanes")]
pub struct Model {
    /// Surrogate primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Hotel property identifier (external PMS code)
    pub property_id: String,

    /// Message family this lane synchronizes (e.g. inventory, rates)
    pub message_kind: String,

    /// Current lifecycle state (idle, pending, running, completed, failed,
    /// retry_pending, degraded)
    pub state: String,

    /// Records registered for synchronization on this lane
    pub records_total: i32,

    /// Records confirmed processed by the partner
    pub records_processed: i32,

    /// Retry attempts consumed for the current failure streak
    pub retry_count: i32,

    /// Retry budget before the lane fails terminally
    pub max_retries: i32,

    /// Failures since the last success
    pub consecutive_failures: i32,

    /// Whether the external scheduler may wake this lane automatically
    pub auto_retry_enabled: bool,

    /// Human-readable message of the most recent classified failure
    pub last_error: Option<String>,

    /// Timestamp of the most recent dispatch attempt
    pub last_attempt_at: Option<DateTimeWithTimeZone>,

    /// Timestamp of the most recent successful outcome
    pub last_success_at: Option<DateTimeWithTimeZone>,

    /// Advisory wake-up time for the next retry, when one is scheduled
    pub next_retry_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the lane row was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the lane row was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
