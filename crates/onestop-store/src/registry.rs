//! File-based feed registry.
//!
//! Layout of a registry directory:
//!
//! ```text
//! feeds/f-<geohash>-<name>.json
//! operators/o-<geohash>-<name>.geojson
//! stops/s-<prefix>.geojson
//! data/<feed id>.zip
//! ```

use crate::stopbins::StopBin;
use onestop_core::error::{OnestopError, Result};
use onestop_core::models::OnestopType;
use onestop_graph::{from_json, to_json, EntityGraph, EntityId};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

pub const FEEDS_DIR: &str = "feeds";
pub const OPERATORS_DIR: &str = "operators";
pub const STOPS_DIR: &str = "stops";
pub const DATA_DIR: &str = "data";

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Write JSON with sorted keys and a 4-space indent
pub fn write_pretty_json(path: &Path, value: &Value) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    sort_keys(value)
        .serialize(&mut serializer)
        .map_err(|e| OnestopError::Serialization(e.to_string()))?;
    buf.push(b'\n');
    fs::write(path, buf)?;
    Ok(())
}

pub fn read_json(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| {
        OnestopError::Serialization(format!("{}: {}", path.display(), e))
    })
}

#[derive(Debug, Clone)]
pub struct FeedRegistry {
    path: PathBuf,
}

impl FeedRegistry {
    /// Open an existing registry; it must contain a `feeds` directory
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.join(FEEDS_DIR).is_dir() {
            return Err(OnestopError::InvalidRegistry { path });
        }
        Ok(Self { path })
    }

    /// Create the registry layout, keeping anything already present
    pub fn init(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        for dir in [FEEDS_DIR, OPERATORS_DIR, STOPS_DIR, DATA_DIR] {
            fs::create_dir_all(path.join(dir))?;
        }
        tracing::info!("Initialized registry at {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn registered(&self, dir: &str, prefix: char) -> Result<Vec<String>> {
        let dir = self.path.join(dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let start = format!("{}-", prefix);
        let mut found = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some((stem, extension)) = file_name.split_once('.') else {
                continue;
            };
            if stem.starts_with(&start) && extension.ends_with("json") {
                found.push(stem.to_string());
            }
        }
        found.sort();
        Ok(found)
    }

    // Listing

    pub fn feeds(&self) -> Result<Vec<String>> {
        self.registered(FEEDS_DIR, OnestopType::Feed.prefix())
    }

    pub fn operators(&self) -> Result<Vec<String>> {
        self.registered(OPERATORS_DIR, OnestopType::Operator.prefix())
    }

    /// Geohash prefixes of the stored stop bins
    pub fn stop_bins(&self) -> Result<Vec<String>> {
        Ok(self
            .registered(STOPS_DIR, OnestopType::Stop.prefix())?
            .into_iter()
            .filter_map(|name| name.strip_prefix("s-").map(str::to_string))
            .collect())
    }

    // Paths

    pub fn feed_path(&self, onestop_id: &str) -> PathBuf {
        self.path.join(FEEDS_DIR).join(format!("{}.json", onestop_id))
    }

    pub fn operator_path(&self, onestop_id: &str) -> PathBuf {
        self.path.join(OPERATORS_DIR).join(format!("{}.geojson", onestop_id))
    }

    pub fn stop_bin_path(&self, prefix: &str) -> PathBuf {
        self.path.join(STOPS_DIR).join(format!("s-{}.geojson", prefix))
    }

    /// Download cache location of a feed's GTFS archive
    pub fn data_path(&self, feed_id: &str) -> PathBuf {
        self.path.join(DATA_DIR).join(format!("{}.zip", feed_id))
    }

    // Reading

    pub fn feed(&self, onestop_id: &str) -> Result<(EntityGraph, EntityId)> {
        from_json(&read_json(&self.feed_path(onestop_id))?)
    }

    pub fn operator(&self, onestop_id: &str) -> Result<(EntityGraph, EntityId)> {
        from_json(&read_json(&self.operator_path(onestop_id))?)
    }

    pub fn stop_bin(&self, prefix: &str) -> Result<StopBin> {
        StopBin::from_json(&read_json(&self.stop_bin_path(prefix))?)
    }

    // Writing

    fn write_entity(&self, path: PathBuf, value: &Value, overwrite: bool) -> Result<PathBuf> {
        if !overwrite && path.exists() {
            return Err(OnestopError::RegistryEntryExists { path });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_pretty_json(&path, value)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn write_feed(&self, graph: &EntityGraph, feed: EntityId, overwrite: bool) -> Result<PathBuf> {
        let path = self.feed_path(&graph.onestop(feed)?);
        self.write_entity(path, &to_json(graph, feed)?, overwrite)
    }

    pub fn write_operator(
        &self,
        graph: &EntityGraph,
        operator: EntityId,
        overwrite: bool,
    ) -> Result<PathBuf> {
        let path = self.operator_path(&graph.onestop(operator)?);
        self.write_entity(path, &to_json(graph, operator)?, overwrite)
    }

    pub fn write_stop_bin(&self, bin: &StopBin) -> Result<PathBuf> {
        self.write_entity(self.stop_bin_path(bin.prefix()), &bin.to_json()?, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onestop_core::models::Geometry;
    use onestop_graph::{Entity, FeedInfo};
    use tempfile::TempDir;

    fn feed_graph() -> (EntityGraph, EntityId) {
        let mut graph = EntityGraph::new();
        let feed = graph.add(
            Entity::feed(FeedInfo { url: Some("http://example.com/dta.zip".into()), ..Default::default() })
                .with_name("dta")
                .with_onestop_id("f-9qs-dta"),
        );
        (graph, feed)
    }

    #[test]
    fn test_open_requires_feeds_dir() {
        let dir = TempDir::new().unwrap();
        let err = FeedRegistry::open(dir.path()).unwrap_err();
        assert!(matches!(err, OnestopError::InvalidRegistry { .. }));

        FeedRegistry::init(dir.path()).unwrap();
        assert!(FeedRegistry::open(dir.path()).is_ok());
        assert!(dir.path().join("operators").is_dir());
        assert!(dir.path().join("data").is_dir());
    }

    #[test]
    fn test_listing_filters_by_prefix() {
        let dir = TempDir::new().unwrap();
        let registry = FeedRegistry::init(dir.path()).unwrap();
        for name in ["f-9qs-dta.json", "f-9q9-caltrain.json", "o-9qs-demo.json", "notes.txt", "f-bad.txt"] {
            fs::write(dir.path().join("feeds").join(name), "{}").unwrap();
        }

        assert_eq!(registry.feeds().unwrap(), vec!["f-9q9-caltrain", "f-9qs-dta"]);
        assert!(registry.operators().unwrap().is_empty());
    }

    #[test]
    fn test_feed_write_and_read() {
        let dir = TempDir::new().unwrap();
        let registry = FeedRegistry::init(dir.path()).unwrap();
        let (graph, feed) = feed_graph();

        let path = registry.write_feed(&graph, feed, false).unwrap();
        assert_eq!(path, registry.feed_path("f-9qs-dta"));

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n    \"feedFormat\": \"gtfs\""));
        let feed_format = contents.find("feedFormat").unwrap();
        let url = contents.find("\"url\"").unwrap();
        assert!(feed_format < url);

        let (loaded, id) = registry.feed("f-9qs-dta").unwrap();
        assert_eq!(loaded.entity(id).feed_info().unwrap().url.as_deref(), Some("http://example.com/dta.zip"));
    }

    #[test]
    fn test_write_refuses_existing_entry() {
        let dir = TempDir::new().unwrap();
        let registry = FeedRegistry::init(dir.path()).unwrap();
        let (graph, feed) = feed_graph();

        registry.write_feed(&graph, feed, false).unwrap();
        let err = registry.write_feed(&graph, feed, false).unwrap_err();
        assert!(matches!(err, OnestopError::RegistryEntryExists { .. }));
        assert!(registry.write_feed(&graph, feed, true).is_ok());
    }

    #[test]
    fn test_stop_bin_files() {
        let dir = TempDir::new().unwrap();
        let registry = FeedRegistry::init(dir.path()).unwrap();

        let mut bin = StopBin::new("9qscv");
        bin.add_stop(
            Entity::stop()
                .with_name("Bullfrog (Demo)")
                .with_geometry(Geometry::point(-116.81797, 36.88108))
                .with_onestop_id("s-9qscv9zzb5-bullfrogdemo"),
        )
        .unwrap();
        registry.write_stop_bin(&bin).unwrap();

        assert_eq!(registry.stop_bins().unwrap(), vec!["9qscv"]);
        let loaded = registry.stop_bin("9qscv").unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_data_path() {
        let registry = FeedRegistry { path: PathBuf::from("/registry") };
        assert_eq!(registry.data_path("f-9qs-dta"), PathBuf::from("/registry/data/f-9qs-dta.zip"));
    }
}
