//! Stop bins: stops grouped by a fixed-length geohash prefix.

use geo::{Distance, Haversine, Point};
use onestop_core::config::DEFAULT_STOP_BIN_PREFIX;
use onestop_core::error::{OnestopError, Result};
use onestop_core::models::OnestopType;
use onestop_geo::geohash::{encode, neighbors, MAX_LENGTH};
use onestop_graph::{from_json, to_json, Entity, EntityGraph, EntityId};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Stops sharing one geohash prefix, keyed by Onestop ID
#[derive(Debug, Clone)]
pub struct StopBin {
    prefix: String,
    graph: EntityGraph,
    stops: BTreeMap<String, EntityId>,
}

impl StopBin {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), graph: EntityGraph::new(), stops: BTreeMap::new() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Stops in Onestop ID order
    pub fn stops(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.stops.values().map(|id| self.graph.entity(*id))
    }

    pub fn stop(&self, onestop_id: &str) -> Option<&Entity> {
        self.stops.get(onestop_id).map(|id| self.graph.entity(*id))
    }

    /// Insert a detached stop, merging into an existing stop with the same
    /// Onestop ID
    pub fn add_stop(&mut self, stop: Entity) -> Result<()> {
        if !stop.is(OnestopType::Stop) {
            return Err(OnestopError::UnsupportedOperation {
                operation: "add_stop".to_string(),
                kind: stop.onestop_type().to_string(),
            });
        }
        let onestop_id = match stop.cached_onestop() {
            Some(onestop_id) => onestop_id.to_string(),
            None => {
                let point = stop.point()?;
                stop.make_onestop(&encode(point.y, point.x, MAX_LENGTH))?
            }
        };

        match self.stops.get(&onestop_id) {
            Some(&existing) => self.graph.entity_mut(existing).merge(&stop, true)?,
            None => {
                let id = self.graph.add(stop.with_onestop_id(onestop_id.clone()));
                self.stops.insert(onestop_id, id);
            }
        }
        Ok(())
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let prefix = value.get("prefix").and_then(Value::as_str).ok_or_else(|| {
            OnestopError::Serialization("stop bin has no prefix".to_string())
        })?;
        let mut bin = Self::new(prefix);
        let features = value.get("features").and_then(Value::as_array).cloned().unwrap_or_default();
        for feature in &features {
            let (graph, stop) = from_json(feature)?;
            bin.add_stop(graph.detach(stop)?)?;
        }
        Ok(bin)
    }

    pub fn to_json(&self) -> Result<Value> {
        let features =
            self.stops.values().map(|id| to_json(&self.graph, *id)).collect::<Result<Vec<_>>>()?;
        Ok(json!({
            "type": "FeatureCollection",
            "properties": {},
            "prefix": self.prefix,
            "features": features,
        }))
    }
}

/// Stop bins keyed by geohash prefix
#[derive(Debug, Clone)]
pub struct StopBinIndex {
    prefix_length: usize,
    bins: BTreeMap<String, StopBin>,
}

impl Default for StopBinIndex {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_BIN_PREFIX)
    }
}

impl StopBinIndex {
    pub fn new(prefix_length: usize) -> Self {
        Self { prefix_length, bins: BTreeMap::new() }
    }

    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> impl Iterator<Item = &StopBin> + '_ {
        self.bins.values()
    }

    pub fn bin(&self, prefix: &str) -> Option<&StopBin> {
        self.bins.get(prefix)
    }

    /// Add a stop read back from disk or detached from a graph
    pub fn add_stop(&mut self, stop: Entity) -> Result<()> {
        let point = stop.point()?;
        let prefix = encode(point.y, point.x, self.prefix_length);
        self.bins.entry(prefix.clone()).or_insert_with(|| StopBin::new(prefix)).add_stop(stop)
    }

    /// Add every stop of a built graph
    pub fn add_graph(&mut self, graph: &EntityGraph) -> Result<usize> {
        let stops = graph.of_type(OnestopType::Stop);
        for stop in &stops {
            self.add_stop(graph.detach(*stop)?)?;
        }
        Ok(stops.len())
    }

    /// Merge a whole bin, e.g. one loaded from the registry
    pub fn add_bin(&mut self, bin: StopBin) -> Result<()> {
        for stop in bin.stops() {
            self.add_stop(stop.clone())?;
        }
        Ok(())
    }

    /// Bins covering a geohash, optionally with its neighbor cells.
    ///
    /// The geohash is cut to the index's prefix length; shorter geohashes
    /// match every bin beneath them.
    pub fn stopbins(&self, geohash: &str, with_neighbors: bool) -> Result<Vec<&StopBin>> {
        let key: String = geohash.chars().take(self.prefix_length).collect();
        let mut cells = vec![key.clone()];
        if with_neighbors {
            cells.extend(neighbors(&key)?);
        }
        Ok(self
            .bins
            .values()
            .filter(|bin| cells.iter().any(|cell| bin.prefix.starts_with(cell.as_str())))
            .collect())
    }

    /// Stops within `radius` meters of a point. Only the point's bin and its
    /// neighbors are searched, so radii beyond one cell may miss stops.
    pub fn stops_near(&self, lon: f64, lat: f64, radius: f64) -> Result<Vec<&Entity>> {
        let origin = Point::new(lon, lat);
        let mut found = Vec::new();
        for bin in self.stopbins(&encode(lat, lon, self.prefix_length), true)? {
            for stop in bin.stops() {
                if Haversine.distance(origin, Point::from(stop.point()?)) <= radius {
                    found.push(stop);
                }
            }
        }
        Ok(found)
    }
}
