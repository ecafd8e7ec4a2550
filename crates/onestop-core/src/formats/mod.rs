//! Input formats
//!
//! Transit data enters the system as GTFS; registry files are plain JSON and
//! are handled by the store crate.

pub mod gtfs;
pub mod tables;

pub use gtfs::{Agency, GtfsFeed, Route, Stop, StopTime, Trip};
pub use tables::{diff_keys, GtfsFiles, KeyDiff, Table};
