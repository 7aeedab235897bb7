//! Database migrations for the ChannelSync service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_08_01_000001_create_sync_lanes;
mod m2026_08_01_000002_create_message_records;
mod m2026_08_01_000003_create_error_records;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_08_01_000001_create_sync_lanes::Migration),
            Box::new(m2026_08_01_000002_create_message_records::Migration),
            Box::new(m2026_08_01_000003_create_error_records::Migration),
        ]
    }
}
