//! Opaque single-slot persistence.
//!
//! The companion keeps exactly one blob across restarts: the last serialized
//! configuration. This crate knows nothing about its contents; `klk-core`
//! layers parsing and the empty-on-failure fallback on top.

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{FileSlotStore, MemorySlotStore, SlotStore};
