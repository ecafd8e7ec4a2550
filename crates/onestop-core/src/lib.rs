//! Onestop Core - Domain models, GTFS reading, and configuration
//!
//! This crate contains the identifier scheme, the canonical geometry model,
//! the GTFS reader and the layered configuration shared by the other crates.

pub mod config;
pub mod error;
pub mod formats;
pub mod models;

pub use error::{OnestopError, Result};
