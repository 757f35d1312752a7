//! Common types and utilities shared across the crate.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`CacheConfig`]
//! - Error types
//! - Identifiers (DeviceId, BlockNo, BlockKey, SlotId)

pub mod config;
pub mod error;
mod block_id;
mod slot_id;

pub use block_id::{BlockKey, BlockNo, DeviceId};
pub use config::CacheConfig;
pub use error::{Error, Result};
pub use slot_id::SlotId;
