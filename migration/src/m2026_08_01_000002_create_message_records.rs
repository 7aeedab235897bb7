//! Migration to create the message_records table.
//!
//! One row per outbound or inbound wire message. The content fingerprint is
//! computed once at creation and indexed for the deduplication ledger; batch
//! membership is indexed for batch-level audit queries.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MessageRecords::ParentId).uuid().null())
                    .col(ColumnDef::new(MessageRecords::BatchId).uuid().null())
                    .col(ColumnDef::new(MessageRecords::PropertyId).text().not_null())
                    .col(
                        ColumnDef::new(MessageRecords::MessageKind)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MessageRecords::Direction).text().not_null())
                    .col(
                        ColumnDef::new(MessageRecords::ContentFingerprint)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MessageRecords::ProcessingState)
                            .text()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(MessageRecords::DuplicateOf).uuid().null())
                    .col(ColumnDef::new(MessageRecords::ResolutionNote).text().null())
                    .col(
                        ColumnDef::new(MessageRecords::SentAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MessageRecords::ReceivedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MessageRecords::ProcessedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(MessageRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(MessageRecords::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_message_records_fingerprint")
                    .table(MessageRecords::Table)
                    .col(MessageRecords::ContentFingerprint)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_message_records_batch_id")
                    .table(MessageRecords::Table)
                    .col(MessageRecords::BatchId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_message_records_property_kind")
                    .table(MessageRecords::Table)
                    .col(MessageRecords::PropertyId)
                    .col(MessageRecords::MessageKind)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum MessageRecords {
    Table,
    Id,
    ParentId,
    BatchId,
    PropertyId,
    MessageKind,
    Direction,
    ContentFingerprint,
    ProcessingState,
    DuplicateOf,
    ResolutionNote,
    SentAt,
    ReceivedAt,
    ProcessedAt,
    CreatedAt,
    UpdatedAt,
}
