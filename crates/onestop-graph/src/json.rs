//! GeoJSON-flavoured records for entities.
//!
//! Feeds serialize to a plain object, operators to a FeatureCollection of
//! their routes and stops, routes and stops to Features. Loading dispatches
//! on the Onestop ID prefix.

use crate::entity::{Entity, FeedInfo, DEFAULT_FEED_FORMAT};
use crate::graph::{EntityGraph, EntityId};
use onestop_core::error::{OnestopError, Result};
use onestop_core::models::{Geometry, OnestopType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Keys dropped from every datastore payload
const DATASTORE_DROPPED: [&str; 2] = ["identifiers", "features"];

/// Relationship keys dropped from datastore payloads without relations
const RELATION_KEYS: [&str; 4] = ["serves", "doesNotServe", "servedBy", "notServedBy"];

fn feature_type() -> String {
    "Feature".to_string()
}

fn feature_collection_type() -> String {
    "FeatureCollection".to_string()
}

fn default_feed_format() -> String {
    DEFAULT_FEED_FORMAT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorInFeed {
    pub onestop_id: String,
    pub gtfs_agency_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRecord {
    pub onestop_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default = "default_feed_format")]
    pub feed_format: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub operators_in_feed: Vec<OperatorInFeed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorRecord {
    #[serde(rename = "type", default = "feature_collection_type")]
    pub kind: String,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub onestop_id: String,
    #[serde(default)]
    pub identifiers: BTreeSet<String>,
    #[serde(default)]
    pub serves: BTreeSet<String>,
    #[serde(default)]
    pub features: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    pub onestop_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub operated_by: Option<String>,
    #[serde(default)]
    pub identifiers: BTreeSet<String>,
    #[serde(default)]
    pub serves: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRecord {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    pub onestop_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub identifiers: BTreeSet<String>,
    #[serde(default)]
    pub served_by: BTreeSet<String>,
}

fn to_value<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| OnestopError::Serialization(e.to_string()))
}

fn from_value<T: for<'de> Deserialize<'de>>(value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|e| OnestopError::Serialization(e.to_string()))
}

pub fn feed_record(graph: &EntityGraph, id: EntityId) -> Result<FeedRecord> {
    let entity = graph.entity(id);
    let info = entity.feed_info().cloned().unwrap_or_default();
    let operators_in_feed = graph
        .operators_in_feed(id)?
        .into_iter()
        .map(|(onestop_id, gtfs_agency_id)| OperatorInFeed { onestop_id, gtfs_agency_id })
        .collect();
    Ok(FeedRecord {
        onestop_id: graph.onestop(id)?,
        name: entity.name.clone(),
        feed_format: info.feed_format().to_string(),
        url: info.url,
        sha1: info.sha1,
        tags: entity.tags.clone(),
        operators_in_feed,
    })
}

pub fn operator_record(graph: &EntityGraph, id: EntityId) -> Result<OperatorRecord> {
    let entity = graph.entity(id);

    let mut members: Vec<(String, EntityId)> = Vec::new();
    for member in graph.routes(id).into_iter().chain(graph.stops(id)) {
        members.push((graph.onestop(member)?, member));
    }
    members.sort();
    let features = members
        .into_iter()
        .map(|(_, member)| to_json(graph, member))
        .collect::<Result<Vec<_>>>()?;

    Ok(OperatorRecord {
        kind: feature_collection_type(),
        geometry: entity.geometry.clone(),
        properties: Map::new(),
        name: entity.name.clone(),
        tags: entity.tags.clone(),
        onestop_id: graph.onestop(id)?,
        identifiers: entity.identifiers().clone(),
        serves: graph.serves(id)?,
        features,
    })
}

pub fn route_record(graph: &EntityGraph, id: EntityId) -> Result<RouteRecord> {
    let entity = graph.entity(id);
    Ok(RouteRecord {
        kind: feature_type(),
        properties: Map::new(),
        geometry: entity.geometry.clone(),
        onestop_id: graph.onestop(id)?,
        name: entity.name.clone(),
        tags: entity.tags.clone(),
        operated_by: graph.operated_by(id)?,
        identifiers: entity.identifiers().clone(),
        serves: graph.serves(id)?,
    })
}

pub fn stop_record(graph: &EntityGraph, id: EntityId) -> Result<StopRecord> {
    let entity = graph.entity(id);
    Ok(StopRecord {
        kind: feature_type(),
        properties: Map::new(),
        geometry: entity.geometry.clone(),
        onestop_id: graph.onestop(id)?,
        name: entity.name.clone(),
        tags: entity.tags.clone(),
        identifiers: entity.identifiers().clone(),
        served_by: graph.served_by(id)?,
    })
}

/// JSON representation of an entity
pub fn to_json(graph: &EntityGraph, id: EntityId) -> Result<Value> {
    match graph.entity(id).onestop_type() {
        OnestopType::Feed => to_value(&feed_record(graph, id)?),
        OnestopType::Operator => to_value(&operator_record(graph, id)?),
        OnestopType::Route => to_value(&route_record(graph, id)?),
        OnestopType::Stop => to_value(&stop_record(graph, id)?),
    }
}

/// JSON payload for the datastore, optionally without relationships
pub fn json_datastore(graph: &EntityGraph, id: EntityId, rels: bool) -> Result<Value> {
    let mut value = to_json(graph, id)?;
    if let Value::Object(map) = &mut value {
        for key in DATASTORE_DROPPED {
            map.remove(key);
        }
        if !rels {
            for key in RELATION_KEYS {
                map.remove(key);
            }
        }
    }
    Ok(value)
}

fn onestop_of(value: &Value) -> Result<&str> {
    value.get("onestopId").and_then(Value::as_str).ok_or_else(|| {
        OnestopError::Serialization("record has no onestopId".to_string())
    })
}

fn with_identifiers(mut entity: Entity, identifiers: BTreeSet<String>) -> Result<Entity> {
    for identifier in identifiers {
        entity.add_identifier(identifier)?;
    }
    Ok(entity)
}

fn base_entity(
    entity: Entity,
    onestop_id: String,
    name: Option<String>,
    geometry: Option<Geometry>,
    tags: BTreeMap<String, String>,
) -> Entity {
    let mut entity = entity.with_onestop_id(onestop_id);
    entity.name = name;
    entity.geometry = geometry;
    entity.tags = tags;
    entity
}

fn load_stop(graph: &mut EntityGraph, record: StopRecord) -> Result<EntityId> {
    let mut entity = base_entity(Entity::stop(), record.onestop_id, record.name, record.geometry, record.tags);
    entity.relations.served_by = record.served_by;
    Ok(graph.add(with_identifiers(entity, record.identifiers)?))
}

fn load_route(graph: &mut EntityGraph, record: RouteRecord) -> Result<EntityId> {
    let mut entity = base_entity(Entity::route(), record.onestop_id, record.name, record.geometry, record.tags);
    entity.relations.serves = record.serves;
    entity.relations.operated_by = record.operated_by.into_iter().collect();
    Ok(graph.add(with_identifiers(entity, record.identifiers)?))
}

fn load_operator(graph: &mut EntityGraph, record: OperatorRecord) -> Result<EntityId> {
    let mut entity =
        base_entity(Entity::operator(), record.onestop_id, record.name, record.geometry, record.tags);
    entity.relations.serves = record.serves;
    let operator = graph.add(with_identifiers(entity, record.identifiers)?);

    let mut stops: HashMap<String, EntityId> = HashMap::new();
    for feature in &record.features {
        if OnestopType::of(onestop_of(feature)?)? == OnestopType::Stop {
            let stop: StopRecord = from_value(feature)?;
            let onestop_id = stop.onestop_id.clone();
            stops.insert(onestop_id, load_stop(graph, stop)?);
        }
    }
    for feature in &record.features {
        if OnestopType::of(onestop_of(feature)?)? == OnestopType::Route {
            let route: RouteRecord = from_value(feature)?;
            let served: Vec<EntityId> =
                route.serves.iter().filter_map(|stop| stops.get(stop).copied()).collect();
            let route = load_route(graph, route)?;
            for stop in served {
                graph.pclink(route, stop);
            }
            graph.pclink(operator, route);
        }
    }
    Ok(operator)
}

fn load_feed(graph: &mut EntityGraph, record: FeedRecord) -> Result<EntityId> {
    let info = FeedInfo { url: record.url, sha1: record.sha1, feed_format: Some(record.feed_format) };
    let mut entity = base_entity(Entity::feed(info), record.onestop_id, record.name, None, record.tags);
    entity.relations.operators_in_feed = record
        .operators_in_feed
        .into_iter()
        .map(|operator| (operator.onestop_id, operator.gtfs_agency_id))
        .collect();
    Ok(graph.add(entity))
}

/// Load a JSON record into an existing graph, returning its root entity
pub fn load_json(graph: &mut EntityGraph, value: &Value) -> Result<EntityId> {
    match OnestopType::of(onestop_of(value)?)? {
        OnestopType::Feed => load_feed(graph, from_value(value)?),
        OnestopType::Operator => load_operator(graph, from_value(value)?),
        OnestopType::Route => load_route(graph, from_value(value)?),
        OnestopType::Stop => load_stop(graph, from_value(value)?),
    }
}

/// Load a JSON record into a new graph
pub fn from_json(value: &Value) -> Result<(EntityGraph, EntityId)> {
    let mut graph = EntityGraph::new();
    let root = load_json(&mut graph, value)?;
    Ok((graph, root))
}
