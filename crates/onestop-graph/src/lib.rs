//! Onestop Graph - Transit entities and the graph built from GTFS
//!
//! Entities live in an [`EntityGraph`] arena. [`build_feed`] turns a GTFS
//! dataset into a graph rooted at one feed, and the [`json`] module reads
//! and writes the registry records.

pub mod builder;
pub mod entity;
pub mod graph;
pub mod json;
pub mod merge;

pub use builder::{build_feed, default_feed_id, parse_reference, FeedBuild, FeedOptions};
pub use entity::{Entity, EntityKind, FeedInfo, Relations};
pub use graph::{EntityGraph, EntityId};
pub use json::{from_json, json_datastore, load_json, to_json};
pub use merge::{gtfs_onestop_ids, merge_onestop_ids, MergeSummary, ONESTOP_ID_COLUMN};
