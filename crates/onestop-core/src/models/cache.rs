use serde::{Deserialize, Serialize};
use std::fmt;

/// How downloads treat a previously fetched file at the destination path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Reuse the cached file only when its SHA-1 matches the expected value;
    /// fetched content must match the expected value as well
    #[default]
    Cache,
    /// Reuse any cached file without checking it
    Reuse,
    /// Always fetch and accept whatever the source serves
    Refresh,
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CachePolicy::Cache => "cache",
            CachePolicy::Reuse => "reuse",
            CachePolicy::Refresh => "refresh",
        };
        f.write_str(name)
    }
}
