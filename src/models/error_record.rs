//! ErrorRecord entity model
//!
//! This module contains the SeaORM entity model for the error_records
//! table. Severity, retryability and the recommended delay are written
//! from the classifier output at creation time; the only later mutation is
//! an operator marking the record resolved.

use super::message_record::Entity as MessageRecord;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// ErrorRecord entity representing one classified failure
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "error_records")]
pub struct Model {
    /// Internal identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Message this failure belongs to
    pub message_id: Uuid,

    /// Classified error kind (closed taxonomy)
    pub error_kind: String,

    /// Severity derived from the kind (critical, high, medium, low)
    pub severity: String,

    /// Human-readable failure message
    pub message: String,

    /// Whether automatic retry is worthwhile for this kind
    pub can_retry: bool,

    /// Recommended retry delay in seconds (0 for non-retryable kinds)
    pub retry_delay_seconds: i64,

    /// Whether an operator must act before the lane can make progress
    pub requires_manual_intervention: bool,

    /// Timestamp when an operator resolved this failure
    pub resolved_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the failure was classified
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "MessageRecord",
        from = "Column::MessageId",
        to = "super::message_record::Column::Id"
    )]
    MessageRecord,
}

impl Related<MessageRecord> for Entity {
    fn to() -> RelationDef {
        Relation::MessageRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
