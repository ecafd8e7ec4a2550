//! In-memory datastore for development and testing.
//!
//! This implementation uses `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state.

use crate::ports::{ChangesetRequest, Datastore, StopQuery};
use geo::{Distance, Haversine, Point};
use onestop_core::error::Result;
use onestop_core::models::Geometry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Records every changeset and keeps the latest data of each entity
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    changesets: Arc<RwLock<Vec<ChangesetRequest>>>,
    entities: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changesets in the order they were posted
    pub fn changesets(&self) -> Vec<ChangesetRequest> {
        self.changesets.read().unwrap().clone()
    }

    /// Current data of an entity
    pub fn entity(&self, onestop_id: &str) -> Option<Value> {
        self.entities.read().unwrap().get(onestop_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entities.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().unwrap().is_empty()
    }

    fn stop_records(&self) -> Vec<Value> {
        self.entities
            .read()
            .unwrap()
            .iter()
            .filter(|(onestop_id, _)| onestop_id.starts_with("s-"))
            .map(|(_, data)| data.clone())
            .collect()
    }
}

fn identified_by(data: &Value, identifier: &str) -> bool {
    data.get("identifiedBy")
        .and_then(Value::as_array)
        .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(identifier)))
}

fn location(data: &Value) -> Option<Point<f64>> {
    let geometry = Geometry::from_geojson(data.get("geometry")?)?;
    geometry.as_point().map(|[x, y]| Point::new(x, y))
}

impl Datastore for MemoryDatastore {
    fn post_changeset(&self, request: &ChangesetRequest) -> Result<()> {
        let mut entities = self.entities.write().unwrap();
        for change in &request.changeset.payload.changes {
            let data = change.target.data();
            let Some(onestop_id) = data.get("onestopId").and_then(Value::as_str) else {
                continue;
            };
            // createUpdate overlays new keys on the stored record
            let stored = entities
                .entry(onestop_id.to_string())
                .or_insert_with(|| Value::Object(Default::default()));
            if let (Value::Object(stored), Value::Object(update)) = (stored, data) {
                for (key, value) in update {
                    stored.insert(key.clone(), value.clone());
                }
            }
            tracing::trace!("Stored {}", onestop_id);
        }
        self.changesets.write().unwrap().push(request.clone());
        Ok(())
    }

    fn stops(&self, query: &StopQuery) -> Result<Vec<Value>> {
        let records = self.stop_records();
        let found = match query {
            StopQuery::Identifier(identifier) => {
                records.into_iter().filter(|data| identified_by(data, identifier)).collect()
            }
            StopQuery::Near { lon, lat, radius } => {
                let origin = Point::new(*lon, *lat);
                records
                    .into_iter()
                    .filter(|data| {
                        location(data)
                            .is_some_and(|point| Haversine.distance(origin, point) <= f64::from(*radius))
                    })
                    .collect()
            }
        };
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::{change, changeset};
    use serde_json::json;

    fn bullfrog() -> Value {
        json!({
            "onestopId": "s-9qscv9zzb5-bullfrogdemo",
            "name": "Bullfrog (Demo)",
            "geometry": {"type": "Point", "coordinates": [-116.81797, 36.88108]},
            "identifiedBy": ["gtfs://f-9qs-dta/s/BULLFROG"]
        })
    }

    #[test]
    fn test_post_overlays_updates() {
        let store = MemoryDatastore::new();
        store.post_changeset(&changeset(vec![change(bullfrog()).unwrap()])).unwrap();
        let update = json!({"onestopId": "s-9qscv9zzb5-bullfrogdemo", "servedBy": ["o-9qs-demotransitauthority"]});
        store.post_changeset(&changeset(vec![change(update).unwrap()])).unwrap();

        assert_eq!(store.changesets().len(), 2);
        assert_eq!(store.len(), 1);
        let stored = store.entity("s-9qscv9zzb5-bullfrogdemo").unwrap();
        assert_eq!(stored["name"], "Bullfrog (Demo)");
        assert_eq!(stored["servedBy"][0], "o-9qs-demotransitauthority");
    }

    #[test]
    fn test_stop_queries() {
        let store = MemoryDatastore::new();
        store.post_changeset(&changeset(vec![change(bullfrog()).unwrap()])).unwrap();

        let by_id = store.stops(&StopQuery::Identifier("gtfs://f-9qs-dta/s/BULLFROG".to_string())).unwrap();
        assert_eq!(by_id.len(), 1);
        assert!(store.stops(&StopQuery::Identifier("gtfs://other/s/1".to_string())).unwrap().is_empty());

        let near = store.stops(&StopQuery::near(-116.8180, 36.8811)).unwrap();
        assert_eq!(near.len(), 1);
        // Nye County Airport is about 3 km away
        let far = store.stops(&StopQuery::near(-116.784582, 36.868446)).unwrap();
        assert!(far.is_empty());
    }
}
