//! Resume capability for harvesting
//!
//! Provides the checkpoint model and its durable store with atomic writes
//! and file locking.

pub mod checkpoint;
pub mod store;

pub use checkpoint::{Checkpoint, DEFAULT_CURSOR};
pub use store::{CheckpointStore, StoreError};
