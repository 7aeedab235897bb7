//! # Data Models
//!
//! SeaORM entity models for the ChannelSync persistence layer, plus the
//! small shared response types used by the HTTP surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod error_record;
pub mod message_record;
pub mod sync_lane;

pub use error_record::Entity as ErrorRecord;
pub use message_record::Entity as MessageRecord;
pub use sync_lane::Entity as SyncLaneRow;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "channelsync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
