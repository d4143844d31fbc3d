//! TTL-bound job record store.
//!
//! This crate provides:
//! - The `JobStore` contract (create / get / compare-and-swap)
//! - A Redis implementation with per-key atomic updates
//! - An in-process implementation for tests and single-node setups

pub mod config;
pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use config::{StoreBackend, StoreConfig, DEFAULT_JOB_TTL_SECS};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;
pub use redis_store::RedisJobStore;
pub use store::{connect, JobStore, Revision, SwapOutcome};
