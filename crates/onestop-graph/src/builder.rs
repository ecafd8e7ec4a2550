//! Build an entity graph from a GTFS dataset.
//!
//! The build runs in four passes: stops (stations first, so platforms fold
//! into their parent), routes (with collision suffixes), operators (one per
//! agency) and finally the feed itself.

use crate::entity::{Entity, FeedInfo};
use crate::graph::{EntityGraph, EntityId, AGENCY_ID_TAG};
use geo::Coord;
use onestop_core::error::{OnestopError, Result};
use onestop_core::formats::GtfsFeed;
use onestop_core::models::{compose, mangle, Geometry, OnestopType};
use onestop_geo::geohash::{encode, MAX_LENGTH};
use onestop_geo::models::{convex_hull, multi_line_string};
use onestop_geo::{geohash_features, Located};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Feed-level inputs to a build
#[derive(Debug, Clone, Default)]
pub struct FeedOptions {
    pub name: String,
    /// Identifier namespace for `gtfs://` references
    pub feed_id: Option<String>,
    pub url: Option<String>,
    pub sha1: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl FeedOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    pub fn with_feed_id(mut self, feed_id: impl Into<String>) -> Self {
        self.feed_id = Some(feed_id.into());
        self
    }
}

/// Result of a build: the graph and its root feed
#[derive(Debug, Clone)]
pub struct FeedBuild {
    pub graph: EntityGraph,
    pub feed: EntityId,
}

impl FeedBuild {
    pub fn operators(&self) -> BTreeSet<EntityId> {
        self.graph.operators(self.feed)
    }

    pub fn routes(&self) -> BTreeSet<EntityId> {
        self.graph.routes(self.feed)
    }

    pub fn stops(&self) -> BTreeSet<EntityId> {
        self.graph.stops(self.feed)
    }

    pub fn onestop(&self) -> Result<String> {
        self.graph.onestop(self.feed)
    }
}

/// Default feed namespace: `f-<fit of every GTFS stop>-<name>`
pub fn default_feed_id(gtfs: &GtfsFeed, name: &str) -> Result<String> {
    let geohash = geohash_features(gtfs.stops.iter().map(|stop| stop.point()))?;
    Ok(compose(OnestopType::Feed, &geohash, &mangle(name)))
}

fn reference(feed_id: &str, kind: OnestopType, original_id: &str) -> String {
    format!("gtfs://{}/{}/{}", feed_id, kind.prefix(), original_id)
}

/// Split a `gtfs://<feed>/<type>/<id>` reference into its parts
pub fn parse_reference(identifier: &str) -> Option<(&str, OnestopType, &str)> {
    let mut parts = identifier.strip_prefix("gtfs://")?.splitn(3, '/');
    let feed_id = parts.next()?;
    let mut prefix = parts.next()?.chars();
    let kind = match (prefix.next(), prefix.next()) {
        (Some(c), None) => OnestopType::from_prefix(c)?,
        _ => return None,
    };
    let original_id = parts.next()?;
    Some((feed_id, kind, original_id))
}

/// Build the entity graph of one GTFS dataset
pub fn build_feed(gtfs: &GtfsFeed, options: FeedOptions) -> Result<FeedBuild> {
    let feed_id = match options.feed_id.clone() {
        Some(feed_id) => feed_id,
        None => default_feed_id(gtfs, &options.name)?,
    };
    tracing::info!("Building feed {} from GTFS", feed_id);

    let mut graph = EntityGraph::new();
    let stop_map = build_stops(gtfs, &feed_id, &mut graph)?;
    let routes = build_routes(gtfs, &feed_id, &stop_map, &mut graph)?;
    let operators = build_operators(gtfs, &feed_id, &routes, &mut graph)?;

    let mut feed_entity = Entity::feed(FeedInfo {
        url: options.url,
        sha1: options.sha1,
        feed_format: None,
    })
    .with_name(options.name);
    feed_entity.add_tags(options.tags);

    let feed = graph.add(feed_entity);
    for operator in operators {
        graph.add_child(feed, operator);
    }
    let onestop_id = graph.resolve_onestop(feed)?;

    tracing::info!(
        "Built {}: {} operators, {} routes, {} stops",
        onestop_id,
        graph.of_type(OnestopType::Operator).len(),
        graph.of_type(OnestopType::Route).len(),
        graph.of_type(OnestopType::Stop).len()
    );
    Ok(FeedBuild { graph, feed })
}

/// Stop pass; returns GTFS stop_id to stop entity
fn build_stops(
    gtfs: &GtfsFeed,
    feed_id: &str,
    graph: &mut EntityGraph,
) -> Result<HashMap<String, EntityId>> {
    let mut stop_map: HashMap<String, EntityId> = HashMap::new();
    let mut by_onestop: HashMap<String, EntityId> = HashMap::new();

    let mut rows: Vec<_> = gtfs.stops.iter().collect();
    rows.sort_by_key(|row| !row.is_station());

    for row in rows {
        let mut contribution = Entity::stop();
        contribution.add_identifier(reference(feed_id, OnestopType::Stop, &row.stop_id))?;
        contribution.add_tags(row.tags());

        let station = row
            .parent_station
            .as_deref()
            .filter(|parent| !parent.is_empty())
            .and_then(|parent| stop_map.get(parent).copied());
        if let Some(station) = station {
            graph.entity_mut(station).merge(&contribution, true)?;
            stop_map.insert(row.stop_id.clone(), station);
            continue;
        }

        let Some([lon, lat]) = row.point() else {
            tracing::warn!("Skipping stop {} without usable coordinates", row.stop_id);
            continue;
        };
        contribution.name = Some(row.stop_name.clone());
        contribution.geometry = Some(Geometry::point(lon, lat));
        let onestop_id = contribution.make_onestop(&encode(lat, lon, MAX_LENGTH))?;

        let stop = match by_onestop.get(&onestop_id) {
            Some(&existing) => {
                tracing::debug!("Merging stop {} into {}", row.stop_id, onestop_id);
                graph.entity_mut(existing).merge(&contribution, true)?;
                existing
            }
            None => {
                let stop = graph.add(contribution.with_onestop_id(onestop_id.clone()));
                by_onestop.insert(onestop_id, stop);
                stop
            }
        };
        stop_map.insert(row.stop_id.clone(), stop);
    }

    tracing::debug!("Grouped {} GTFS stops into {} stops", gtfs.stops.len(), by_onestop.len());
    Ok(stop_map)
}

/// Route pass; returns each built route with its GTFS agency_id
fn build_routes(
    gtfs: &GtfsFeed,
    feed_id: &str,
    stop_map: &HashMap<String, EntityId>,
    graph: &mut EntityGraph,
) -> Result<Vec<(EntityId, Option<String>)>> {
    let patterns = gtfs.stop_patterns();
    let mut built: HashMap<String, EntityId> = HashMap::new();
    let mut collisions: HashMap<String, usize> = HashMap::new();
    let mut routes = Vec::new();

    for row in &gtfs.routes {
        let Some(name) = row.name() else {
            tracing::warn!("Skipping route {} without a name", row.route_id);
            continue;
        };

        let route_patterns: Vec<Vec<EntityId>> = patterns
            .get(row.route_id.as_str())
            .into_iter()
            .flatten()
            .map(|pattern| pattern.iter().filter_map(|stop_id| stop_map.get(*stop_id).copied()).collect())
            .collect();
        let stops: BTreeSet<EntityId> = route_patterns.iter().flatten().copied().collect();
        if stops.is_empty() {
            tracing::warn!("Skipping route {} without stops", row.route_id);
            continue;
        }

        let lines: Vec<Vec<Coord<f64>>> = route_patterns
            .iter()
            .map(|pattern| pattern.iter().filter_map(|stop| graph.entity(*stop).location()).collect())
            .collect();

        let mut entity = Entity::route().with_name(name).with_geometry(multi_line_string(&lines));
        entity.add_identifier(reference(feed_id, OnestopType::Route, &row.route_id))?;
        entity.add_tags(row.tags());

        let route = graph.add(entity);
        for stop in stops {
            graph.pclink(route, stop);
        }

        let original = graph.derive_onestop(route)?;
        let mut onestop_id = original.clone();
        while built.contains_key(&onestop_id) {
            let counter = collisions.entry(original.clone()).or_default();
            *counter += 1;
            graph.entity_mut(route).name = Some(format!("{}~{}", name, counter));
            onestop_id = graph.derive_onestop(route)?;
            tracing::warn!("Route {} collides with {}, using {}", row.route_id, original, onestop_id);
        }
        graph.entity_mut(route).set_onestop(onestop_id.clone());
        built.insert(onestop_id, route);
        routes.push((route, row.agency_id.clone().filter(|id| !id.is_empty())));
    }
    Ok(routes)
}

/// Operator pass; returns the operators that have routes
fn build_operators(
    gtfs: &GtfsFeed,
    feed_id: &str,
    routes: &[(EntityId, Option<String>)],
    graph: &mut EntityGraph,
) -> Result<Vec<EntityId>> {
    let mut operators = Vec::new();
    let mut claimed: BTreeSet<EntityId> = BTreeSet::new();

    for (index, agency) in gtfs.agencies.iter().enumerate() {
        let agency_id = agency.agency_id.clone().filter(|id| !id.is_empty());
        let owned: Vec<EntityId> = routes
            .iter()
            .filter(|(_, route_agency)| match route_agency {
                Some(route_agency) => agency_id.as_ref() == Some(route_agency),
                None => index == 0,
            })
            .map(|(route, _)| *route)
            .collect();
        if owned.is_empty() {
            tracing::warn!("Skipping agency {} without routes", agency.agency_name);
            continue;
        }

        let mut entity = Entity::operator().with_name(agency.agency_name.clone());
        let original_id = agency_id.clone().unwrap_or_else(|| mangle(&agency.agency_name));
        entity.add_identifier(reference(feed_id, OnestopType::Operator, &original_id))?;
        entity.add_tags(agency.tags());
        if let Some(agency_id) = &agency_id {
            entity.set_tag(AGENCY_ID_TAG, agency_id.clone());
        }

        let operator = graph.add(entity);
        for route in &owned {
            graph.pclink(operator, *route);
            claimed.insert(*route);
        }

        let points: Vec<Coord<f64>> =
            graph.stops(operator).into_iter().filter_map(|stop| graph.entity(stop).location()).collect();
        graph.entity_mut(operator).geometry = convex_hull(&points);
        graph.resolve_onestop(operator)?;
        operators.push(operator);
    }

    for (route, agency_id) in routes {
        if !claimed.contains(route) {
            tracing::warn!(
                "Route {} references unknown agency {}",
                graph.onestop(*route)?,
                agency_id.as_deref().unwrap_or_default()
            );
        }
    }

    if operators.is_empty() {
        return Err(OnestopError::NoPoints);
    }
    Ok(operators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onestop_core::formats::{Agency, Route, Stop, StopTime, Trip};

    fn stop(stop_id: &str, name: &str, lat: f64, lon: f64) -> Stop {
        Stop {
            stop_id: stop_id.to_string(),
            stop_name: name.to_string(),
            stop_lat: Some(lat),
            stop_lon: Some(lon),
            ..Default::default()
        }
    }

    fn route(route_id: &str, short_name: &str) -> Route {
        Route {
            route_id: route_id.to_string(),
            route_short_name: Some(short_name.to_string()),
            route_type: Some(3),
            ..Default::default()
        }
    }

    fn trip(trip_id: &str, route_id: &str, stops: &[&str]) -> (Trip, Vec<StopTime>) {
        let trip = Trip { trip_id: trip_id.to_string(), route_id: route_id.to_string() };
        let stop_times = stops
            .iter()
            .enumerate()
            .map(|(i, stop_id)| StopTime {
                trip_id: trip_id.to_string(),
                stop_id: stop_id.to_string(),
                stop_sequence: i as u32 + 1,
            })
            .collect();
        (trip, stop_times)
    }

    fn small_feed() -> GtfsFeed {
        let mut gtfs = GtfsFeed {
            agencies: vec![Agency { agency_name: "Demo".to_string(), ..Default::default() }],
            stops: vec![
                stop("A", "Alpha", 37.7, -122.4),
                stop("B", "Beta", 37.71, -122.41),
                stop("C", "Gamma", 37.72, -122.42),
            ],
            routes: vec![route("R1", "1"), route("R2", "1"), route("EMPTY", "9")],
            ..Default::default()
        };
        for (trip, stop_times) in [trip("T1", "R1", &["A", "B"]), trip("T2", "R2", &["A", "B"])] {
            gtfs.trips.push(trip);
            gtfs.stop_times.extend(stop_times);
        }
        gtfs
    }

    #[test]
    fn test_route_without_stops_is_skipped() {
        let build = build_feed(&small_feed(), FeedOptions::new("demo")).unwrap();
        assert_eq!(build.routes().len(), 2);
        for route in build.routes() {
            assert!(build.graph.entity(route).identifiers().iter().all(|id| !id.ends_with("/EMPTY")));
        }
    }

    #[test]
    fn test_colliding_routes_are_suffixed() {
        let build = build_feed(&small_feed(), FeedOptions::new("demo")).unwrap();
        let ids: BTreeSet<String> =
            build.routes().into_iter().map(|r| build.graph.onestop(r).unwrap()).collect();

        assert_eq!(ids.len(), 2);
        let base = ids.iter().find(|id| id.ends_with("-1")).unwrap();
        let suffixed = ids.iter().find(|id| id.ends_with("-1~1")).unwrap();
        assert_eq!(base.rsplit_once('-').unwrap().0, suffixed.rsplit_once('-').unwrap().0);
    }

    #[test]
    fn test_routes_without_agency_belong_to_first_agency() {
        let mut gtfs = small_feed();
        gtfs.agencies.push(Agency {
            agency_id: Some("OTHER".to_string()),
            agency_name: "Other".to_string(),
            ..Default::default()
        });
        let build = build_feed(&gtfs, FeedOptions::new("demo")).unwrap();

        let operators = build.operators();
        assert_eq!(operators.len(), 1);
        let operator = build.graph.entity(*operators.first().unwrap());
        assert_eq!(operator.name(), Some("Demo"));
        assert!(operator.identifiers().iter().any(|id| id.ends_with("/o/demo")));
    }

    #[test]
    fn test_platforms_merge_into_station() {
        let mut gtfs = small_feed();
        gtfs.stops.push(Stop { parent_station: Some("S".to_string()), ..stop("P1", "Platform 1", 37.7001, -122.4001) });
        gtfs.stops.push(Stop { location_type: Some(1), ..stop("S", "Station", 37.7, -122.4) });
        let (trip, stop_times) = trip("T3", "R1", &["P1", "C"]);
        gtfs.trips.push(trip);
        gtfs.stop_times.extend(stop_times);

        let build = build_feed(&gtfs, FeedOptions::new("demo").with_feed_id("f-test")).unwrap();
        let stops = build.graph.of_type(OnestopType::Stop);
        assert_eq!(stops.len(), 4);
        let entity = build.graph.entity(stops[0]);
        assert_eq!(entity.name(), Some("Station"));
        assert!(entity.identifiers().contains("gtfs://f-test/s/P1"));
        assert!(entity.identifiers().contains("gtfs://f-test/s/S"));
    }

    #[test]
    fn test_stops_without_coordinates_are_skipped() {
        let mut gtfs = small_feed();
        gtfs.stops.push(Stop { stop_id: "X".to_string(), stop_name: "Nowhere".to_string(), ..Default::default() });
        let build = build_feed(&gtfs, FeedOptions::new("demo")).unwrap();
        assert_eq!(build.graph.of_type(OnestopType::Stop).len(), 3);
    }

    #[test]
    fn test_same_identifier_stops_merge() {
        let mut gtfs = small_feed();
        gtfs.stops.push(stop("A2", "Alpha", 37.7, -122.4));
        let build = build_feed(&gtfs, FeedOptions::new("demo").with_feed_id("f-test")).unwrap();

        let stops = build.graph.of_type(OnestopType::Stop);
        assert_eq!(stops.len(), 3);
        let alpha = build.graph.entity(stops[0]);
        assert_eq!(alpha.identifiers().len(), 2);
    }

    #[test]
    fn test_feed_without_stops_fails() {
        let gtfs = GtfsFeed {
            agencies: vec![Agency { agency_name: "Empty".to_string(), ..Default::default() }],
            ..Default::default()
        };
        let err = build_feed(&gtfs, FeedOptions::new("empty")).unwrap_err();
        assert!(matches!(err, OnestopError::NoPoints));
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            parse_reference("gtfs://f-9qs-dta/s/BULLFROG"),
            Some(("f-9qs-dta", OnestopType::Stop, "BULLFROG"))
        );
        assert_eq!(parse_reference("gtfs://f-test/r/A/B"), Some(("f-test", OnestopType::Route, "A/B")));
        assert_eq!(parse_reference("gtfs://f-test/x/A"), None);
        assert_eq!(parse_reference("gtfs://f-test/stop/A"), None);
        assert_eq!(parse_reference("http://f-test/s/A"), None);
    }

    #[test]
    fn test_feed_options() {
        let options = FeedOptions::new("demo").with_url("http://example.com/gtfs.zip").with_sha1("abc");
        let build = build_feed(&small_feed(), options).unwrap();
        let info = build.graph.entity(build.feed).feed_info().unwrap();
        assert_eq!(info.url.as_deref(), Some("http://example.com/gtfs.zip"));
        assert_eq!(info.sha1.as_deref(), Some("abc"));
    }
}
