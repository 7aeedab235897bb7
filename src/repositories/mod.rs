//! # Repositories
//!
//! Repository layer encapsulating SeaORM operations per table. Repositories
//! log failures and bubble `DbErr` upward; handlers translate to problem
//! responses and the orchestrator's store adapter translates to its own
//! error type.

pub mod error_record;
pub mod message_record;
pub mod store;
pub mod sync_lane;

pub use error_record::ErrorRecordRepository;
pub use message_record::MessageRecordRepository;
pub use store::DbSyncStore;
pub use sync_lane::SyncLaneRepository;
