//! MessageRecord entity model
//!
//! This module contains the SeaORM entity model for the message_records
//! table: one row per outbound or inbound wire message, keyed by the
//! globally unique message id. The content fingerprint is immutable after
//! creation; duplicates are annotated via `duplicate_of`, never discarded.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// MessageRecord entity representing one wire message
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "message_records")]
pub struct Model {
    /// Globally unique message identifier (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Parent message for response/follow-up chains
    pub parent_id: Option<Uuid>,

    /// Batch this message belongs to, when batched
    pub batch_id: Option<Uuid>,

    /// Hotel property identifier
    pub property_id: String,

    /// Message family (inventory, rates, reservations, ...)
    pub message_kind: String,

    /// Message direction (outbound, inbound)
    pub direction: String,

    /// Stable content hash of the serialized wire payload; set once at
    /// creation
    pub content_fingerprint: String,

    /// Processing state (pending, sent, received, processed, failed)
    pub processing_state: String,

    /// First message id seen with the same fingerprint, when this one is a
    /// duplicate within the dedup window
    pub duplicate_of: Option<Uuid>,

    /// Operator note attached after terminal processing
    pub resolution_note: Option<String>,

    /// Timestamp when the message was sent to the partner
    pub sent_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when a response or inbound message was received
    pub received_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when processing finished
    pub processed_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the record was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the record was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::error_record::Entity")]
    ErrorRecords,
}

impl Related<super::error_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ErrorRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
