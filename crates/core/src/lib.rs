//! Clinic store core library.
//!
//! This crate provides the persistence layer of the clinic manager: one
//! `|`-delimited table file per entity, a typed generic store over those
//! files, and a write-through relational mirror that replaces each mirrored
//! table after every write.

pub mod codec;
pub mod config;
pub mod errors;
pub mod mirror;
pub mod models;
pub mod store;

// Re-exports for convenience.
pub use codec::{Record, RecordCodec};
pub use config::{MirrorSettings, ShortRowPolicy, StoreConfig};
pub use errors::{CoreError, StoreError};
pub use mirror::{ConnectionProvider, MirrorSync};
pub use store::{Entity, EntityStore, Store};
