//! Checksum-gated downloads of GTFS archives.

use onestop_core::error::{OnestopError, Result};
use onestop_core::models::CachePolicy;
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

const BLOCK_SIZE: usize = 64 * 1024;

/// Hex SHA-1 of a file, read in 64 KiB blocks
pub fn sha1_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut block = vec![0u8; BLOCK_SIZE];
    loop {
        let read = file.read(&mut block)?;
        if read == 0 {
            break;
        }
        hasher.update(&block[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Outcome of [`download`]
#[derive(Debug, Clone, PartialEq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub sha1: String,
    /// True when an existing file was reused without fetching
    pub cached: bool,
}

/// Fetch `url` to `destination` according to `policy`.
///
/// - `Cache` reuses an existing file only if it matches `expected_sha1`; a
///   fresh download that does not match is removed and reported as
///   `InvalidChecksum`.
/// - `Reuse` keeps any existing file.
/// - `Refresh` always downloads and skips verification.
pub fn download(
    url: &str,
    destination: &Path,
    expected_sha1: Option<&str>,
    policy: CachePolicy,
) -> Result<Downloaded> {
    if url.is_empty() {
        return Err(OnestopError::Download { url: url.to_string(), reason: "no url given".to_string() });
    }
    if destination.as_os_str().is_empty() {
        return Err(OnestopError::Download {
            url: url.to_string(),
            reason: "no destination given".to_string(),
        });
    }

    if destination.exists() {
        let sha1 = sha1_file(destination)?;
        match policy {
            CachePolicy::Cache if expected_sha1 == Some(sha1.as_str()) => {
                tracing::info!("Cached: {} (valid sha1)", destination.display());
                return Ok(Downloaded { path: destination.to_path_buf(), sha1, cached: true });
            }
            CachePolicy::Cache if expected_sha1.is_some() => {
                tracing::info!("Cached: {} (incorrect sha1)", destination.display());
            }
            CachePolicy::Reuse => {
                tracing::info!("Cached: {} (sha1 not checked)", destination.display());
                return Ok(Downloaded { path: destination.to_path_buf(), sha1, cached: true });
            }
            _ => {}
        }
    }

    tracing::info!("Downloading: {} -> {}", url, destination.display());
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fetch(url, destination)?;

    let sha1 = sha1_file(destination)?;
    if policy == CachePolicy::Cache {
        if let Some(expected) = expected_sha1.filter(|expected| *expected != sha1) {
            fs::remove_file(destination)?;
            return Err(OnestopError::InvalidChecksum {
                path: destination.to_path_buf(),
                expected: expected.to_string(),
                actual: sha1,
            });
        }
    }
    Ok(Downloaded { path: destination.to_path_buf(), sha1, cached: false })
}

fn fetch(url: &str, destination: &Path) -> Result<()> {
    let failed = |reason: String| OnestopError::Download { url: url.to_string(), reason };

    if let Some(source) = url.strip_prefix("file://") {
        fs::copy(source, destination).map_err(|e| failed(e.to_string()))?;
        return Ok(());
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(failed("unsupported url scheme".to_string()));
    }

    let mut response = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .map_err(|e| failed(e.to_string()))?;
    let mut file = File::create(destination)?;
    io::copy(&mut response, &mut file).map_err(|e| failed(e.to_string()))?;
    Ok(())
}
