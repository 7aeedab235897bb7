//! # ChannelSync Library
//!
//! Synchronization orchestration between a hotel property management system
//! and a SOAP/XML distribution network: failure classification, content
//! deduplication, linked-rate resolution, and per-lane retry state machines.

pub mod classify;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod fingerprint;
pub mod handlers;
pub mod models;
pub mod rates;
pub mod repositories;
pub mod server;
pub mod sync;
pub mod telemetry;
pub mod transport;
pub use migration;
