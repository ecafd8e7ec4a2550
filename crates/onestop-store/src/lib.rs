//! Onestop Store - Registry storage and datastore synchronization
//!
//! This crate keeps feeds, operators and stop bins on disk, downloads GTFS
//! archives behind a checksum-gated cache, and publishes entities to a
//! transit datastore through the [`ports::Datastore`] port.

pub mod datastore;
pub mod fetch;
pub mod memory;
pub mod ports;
pub mod registry;
pub mod stopbins;

pub use datastore::HttpDatastore;
pub use fetch::{download, sha1_file, Downloaded};
pub use memory::MemoryDatastore;
pub use ports::{Datastore, StopQuery};
pub use registry::FeedRegistry;
pub use stopbins::{StopBin, StopBinIndex};
