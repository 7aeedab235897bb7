//! Migration to create the sync_lanes table.
//!
//! A sync lane is the synchronization unit for one (property, message kind)
//! pair. It owns retry scheduling state and the counters from which the
//! derived health score is recomputed on read.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncLanes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncLanes::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncLanes::PropertyId).text().not_null())
                    .col(ColumnDef::new(SyncLanes::MessageKind).text().not_null())
                    .col(
                        ColumnDef::new(SyncLanes::State)
                            .text()
                            .not_null()
                            .default("idle"),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::RecordsTotal)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::RecordsProcessed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::MaxRetries)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::ConsecutiveFailures)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::AutoRetryEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(SyncLanes::LastError).text().null())
                    .col(
                        ColumnDef::new(SyncLanes::LastAttemptAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::LastSuccessAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::NextRetryAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(SyncLanes::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One lane per (property, message kind)
        manager
            .create_index(
                Index::create()
                    .name("ux_sync_lanes_property_kind")
                    .table(SyncLanes::Table)
                    .col(SyncLanes::PropertyId)
                    .col(SyncLanes::MessageKind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Supports the external scheduler's due-retry poll
        manager
            .create_index(
                Index::create()
                    .name("ix_sync_lanes_next_retry_at")
                    .table(SyncLanes::Table)
                    .col(SyncLanes::NextRetryAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SyncLanes::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum SyncLanes {
    Table,
    Id,
    PropertyId,
    MessageKind,
    State,
    RecordsTotal,
    RecordsProcessed,
    RetryCount,
    MaxRetries,
    ConsecutiveFailures,
    AutoRetryEnabled,
    LastError,
    LastAttemptAt,
    LastSuccessAt,
    NextRetryAt,
    CreatedAt,
    UpdatedAt,
}
