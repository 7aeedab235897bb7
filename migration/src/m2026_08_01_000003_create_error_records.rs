//! Migration to create the error_records table.
//!
//! One row per classified failure. Severity and retryability are derived
//! from the error kind at classification time; rows are mutated exactly
//! once, when an operator resolves them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ErrorRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ErrorRecords::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ErrorRecords::MessageId).uuid().not_null())
                    .col(ColumnDef::new(ErrorRecords::ErrorKind).text().not_null())
                    .col(ColumnDef::new(ErrorRecords::Severity).text().not_null())
                    .col(ColumnDef::new(ErrorRecords::Message).text().not_null())
                    .col(
                        ColumnDef::new(ErrorRecords::CanRetry)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ErrorRecords::RetryDelaySeconds)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ErrorRecords::RequiresManualIntervention)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ErrorRecords::ResolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ErrorRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_error_records_message_id")
                            .from(ErrorRecords::Table, ErrorRecords::MessageId)
                            .to(MessageRecords::Table, MessageRecords::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_error_records_message_id")
                    .table(ErrorRecords::Table)
                    .col(ErrorRecords::MessageId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ErrorRecords::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ErrorRecords {
    Table,
    Id,
    MessageId,
    ErrorKind,
    Severity,
    Message,
    CanRetry,
    RetryDelaySeconds,
    RequiresManualIntervention,
    ResolvedAt,
    CreatedAt,
}

#[derive(Iden)]
enum MessageRecords {
    Table,
    Id,
}
