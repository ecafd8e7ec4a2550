//! Datastore synchronization.
//!
//! Entities are posted as changesets of `createUpdate` actions. The
//! datastore checks references, so an operator is published in two phases:
//! first the operator and its stops without relationships, then the
//! operator and routes with relationships, then the stops again.

use crate::ports::{Change, ChangeTarget, Changeset, ChangesetRequest, Datastore, Payload, StopQuery};
use onestop_core::error::{OnestopError, Result};
use onestop_core::models::OnestopType;
use onestop_graph::{json_datastore, load_json, EntityGraph, EntityId};
use serde_json::{Map, Value};

pub const CREATE_UPDATE: &str = "createUpdate";
pub const INSTANTLY_IF_CLEAN: &str = "instantlyIfClean";

/// Keys of an entity record sent to the datastore
const CHANGE_KEYS: [&str; 7] =
    ["onestopId", "name", "geometry", "tags", "identifiedBy", "operatedBy", "servedBy"];

/// Wrap entity data into a change for its datastore type
pub fn change(data: Value) -> Result<Change> {
    let onestop_id = data.get("onestopId").and_then(Value::as_str).unwrap_or_default();
    let target = match OnestopType::of(onestop_id)? {
        OnestopType::Operator => ChangeTarget::Operator(data),
        OnestopType::Route => ChangeTarget::Route(data),
        OnestopType::Stop => ChangeTarget::Stop(data),
        OnestopType::Feed => {
            return Err(OnestopError::UnsupportedOperation {
                operation: "publish".to_string(),
                kind: OnestopType::Feed.to_string(),
            })
        }
    };
    Ok(Change { action: CREATE_UPDATE.to_string(), target })
}

pub fn changeset(changes: Vec<Change>) -> ChangesetRequest {
    ChangesetRequest {
        changeset: Changeset { when_to_apply: INSTANTLY_IF_CLEAN.to_string(), payload: Payload { changes } },
    }
}

/// Datastore record of an entity, limited to the keys the datastore accepts
pub fn change_data(graph: &EntityGraph, id: EntityId, rels: bool) -> Result<Value> {
    let mut data = json_datastore(graph, id, rels)?;
    let Value::Object(map) = &mut data else {
        return Ok(data);
    };
    let identifiers = graph.entity(id).identifiers().iter().cloned().map(Value::String).collect();
    map.insert("identifiedBy".to_string(), Value::Array(identifiers));

    let kept: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| CHANGE_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Ok(Value::Object(kept))
}

/// Publish one entity in its own changeset
pub fn update_entity(
    store: &impl Datastore,
    graph: &EntityGraph,
    id: EntityId,
    rels: bool,
) -> Result<()> {
    let request = changeset(vec![change(change_data(graph, id, rels)?)?]);
    tracing::debug!("Publishing {} (rels: {})", graph.onestop(id)?, rels);
    store.post_changeset(&request)
}

/// Publish several entities in one changeset, operators before routes
/// before stops
pub fn update_entities(store: &impl Datastore, graph: &EntityGraph, ids: &[EntityId]) -> Result<()> {
    let mut changes = Vec::new();
    for kind in [OnestopType::Operator, OnestopType::Route, OnestopType::Stop] {
        for id in ids.iter().filter(|id| graph.entity(**id).is(kind)) {
            changes.push(change(change_data(graph, *id, true)?)?);
        }
    }
    store.post_changeset(&changeset(changes))
}

/// Publish an operator with its routes and stops; returns the number of
/// changesets posted
pub fn update_operator(store: &impl Datastore, graph: &EntityGraph, operator: EntityId) -> Result<usize> {
    let stops = graph.stops(operator);
    let routes = graph.routes(operator);
    tracing::info!(
        "Publishing operator {} with {} routes and {} stops",
        graph.onestop(operator)?,
        routes.len(),
        stops.len()
    );

    let mut posted = 0;
    update_entity(store, graph, operator, false)?;
    posted += 1;
    for stop in &stops {
        update_entity(store, graph, *stop, false)?;
        posted += 1;
    }

    update_entity(store, graph, operator, true)?;
    posted += 1;
    for route in &routes {
        update_entity(store, graph, *route, true)?;
        posted += 1;
    }
    for stop in &stops {
        update_entity(store, graph, *stop, true)?;
        posted += 1;
    }
    Ok(posted)
}

/// Look up stops and load them into a new graph
pub fn find_stops(store: &impl Datastore, query: &StopQuery) -> Result<(EntityGraph, Vec<EntityId>)> {
    let mut graph = EntityGraph::new();
    let mut found = Vec::new();
    for mut record in store.stops(query)? {
        if let Value::Object(map) = &mut record {
            if !map.contains_key("onestopId") {
                if let Some(onestop_id) = map.remove("onestop_id") {
                    map.insert("onestopId".to_string(), onestop_id);
                }
            }
        }
        found.push(load_json(&mut graph, &record)?);
    }
    Ok((graph, found))
}

/// HTTP datastore client
#[derive(Debug, Clone)]
pub struct HttpDatastore {
    endpoint: String,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpDatastore {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
            client: reqwest::blocking::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn changesets_url(&self) -> String {
        format!("{}/api/v1/changesets/", self.endpoint)
    }

    pub fn stops_url(&self) -> String {
        format!("{}/api/v1/stops", self.endpoint)
    }

    /// Stop lookup request; parameters are form-encoded by reqwest
    pub fn stops_request(&self, query: &StopQuery) -> reqwest::blocking::RequestBuilder {
        self.client.get(self.stops_url()).query(&query.params())
    }

    fn authorize(&self, request: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Token token={}", token)),
            None => request,
        }
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Value> {
        let failed = |e: reqwest::Error| OnestopError::Datastore { reason: e.to_string() };
        self.authorize(request)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(failed)?
            .json::<Value>()
            .map_err(failed)
    }
}

impl Datastore for HttpDatastore {
    fn post_changeset(&self, request: &ChangesetRequest) -> Result<()> {
        let url = self.changesets_url();
        tracing::debug!("POST {}", url);
        let response = self.send(self.client.post(&url).json(request))?;
        tracing::trace!("Response: {}", response);
        Ok(())
    }

    fn stops(&self, query: &StopQuery) -> Result<Vec<Value>> {
        tracing::debug!("GET {} {:?}", self.stops_url(), query);
        let response = self.send(self.stops_request(query))?;
        match response.get("stops") {
            Some(Value::Array(stops)) => Ok(stops.clone()),
            _ => Err(OnestopError::Datastore { reason: "response has no stops".to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_changeset_shape() {
        let data = json!({"onestopId": "s-9qscv9zzb5-bullfrogdemo", "name": "Bullfrog (Demo)"});
        let request = changeset(vec![change(data.clone()).unwrap()]);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "changeset": {
                    "whenToApply": "instantlyIfClean",
                    "payload": {"changes": [{"action": "createUpdate", "stop": data}]}
                }
            })
        );
    }

    #[test]
    fn test_feeds_cannot_be_published() {
        let err = change(json!({"onestopId": "f-9qs-dta"})).unwrap_err();
        assert!(matches!(err, OnestopError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_urls() {
        let store = HttpDatastore::new("http://localhost:3000/", Some("secret".to_string()));
        assert_eq!(store.changesets_url(), "http://localhost:3000/api/v1/changesets/");
        assert_eq!(store.stops_url(), "http://localhost:3000/api/v1/stops");

        let request = store.stops_request(&StopQuery::near(-116.81797, 36.88108)).build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:3000/api/v1/stops?lon=-116.81797000&lat=36.88108000&r=1000"
        );
    }

    #[test]
    fn test_identifier_query_is_encoded() {
        let store = HttpDatastore::new("http://localhost:3000", None);
        let identifier = "gtfs://f/s/A&B #1+2%";
        let request = store.stops_request(&StopQuery::Identifier(identifier.to_string())).build().unwrap();

        let pairs: Vec<(String, String)> = request.url().query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("identifier".to_string(), identifier.to_string())]);
        assert!(request.url().fragment().is_none());
    }
}
