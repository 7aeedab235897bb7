//! # Synchronization Core
//!
//! The per-lane state machine, the persistence seam and the orchestrator
//! facade that producer jobs call into.

pub mod lane;
pub mod orchestrator;
pub mod store;

pub use lane::{BackoffPolicy, HealthPolicy, LaneKey, LaneState, MessageKind, SyncLane};
pub use orchestrator::SyncOrchestrator;
pub use store::{NullStore, SyncStore};
