//! Error types for Onestop

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OnestopError {
    // Identifier errors
    #[error("No points available to compute a geohash")]
    NoPoints,

    #[error("Identifier already present: {identifier}")]
    ExistingIdentifier { identifier: String },

    #[error("Invalid geohash '{geohash}': unexpected character '{character}'")]
    InvalidGeohash { geohash: String, character: char },

    #[error("Invalid Onestop ID: {onestop_id}")]
    InvalidOnestopId { onestop_id: String },

    // Entity errors
    #[error("Entity not found: {onestop_id}")]
    EntityNotFound { onestop_id: String },

    #[error("Operation '{operation}' is not supported for {kind} entities")]
    UnsupportedOperation { operation: String, kind: String },

    #[error("Entity '{name}' has no point geometry")]
    MissingGeometry { name: String },

    #[error("Cannot derive an identifier for an unnamed {kind}")]
    MissingName { kind: String },

    // Registry errors
    #[error("Invalid registry at {path}: missing feeds directory")]
    InvalidRegistry { path: PathBuf },

    #[error("Registry entry already exists: {path}")]
    RegistryEntryExists { path: PathBuf },

    // GTFS errors
    #[error("GTFS file missing from archive: {name}")]
    MissingGtfsFile { name: String },

    #[error("Failed to read GTFS {name}: {reason}")]
    Gtfs { name: String, reason: String },

    // Transfer errors
    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    InvalidChecksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Datastore request failed: {reason}")]
    Datastore { reason: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, OnestopError>;
