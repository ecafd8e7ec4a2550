//! Onestop Geo - Geohash codec and spatial operations
//!
//! This crate handles the geohash encoding behind identifiers, the
//! neighbor-fit used to summarize a set of points, and conversions to the
//! `geo` crate for hulls and centroids.

pub mod geohash;
pub mod models;
pub mod spatial;

pub use spatial::{centroid, geohash_features, neighbor_fit, Located, FIT_MAX_LENGTH};
