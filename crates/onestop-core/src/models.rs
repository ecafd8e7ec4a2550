pub mod cache;
pub mod geometry;
pub mod onestop_id;

pub use cache::CachePolicy;
pub use geometry::Geometry;
pub use onestop_id::{compose, mangle, mangle_stop, OnestopType, GEOHASH_LENGTH, MAX_LENGTH};
