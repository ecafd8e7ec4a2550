use onestop_core::formats::{GtfsFeed, GtfsFiles};
use onestop_core::models::OnestopType;
use onestop_graph::{
    build_feed, default_feed_id, from_json, json_datastore, merge_onestop_ids, to_json, FeedBuild,
    FeedOptions, MergeSummary, ONESTOP_ID_COLUMN,
};
use std::collections::BTreeSet;

const DTA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/gtfs/dta");

fn build() -> FeedBuild {
    let gtfs = GtfsFeed::open(DTA).unwrap();
    build_feed(&gtfs, FeedOptions::new("dta")).unwrap()
}

fn onestops(build: &FeedBuild, kind: OnestopType) -> BTreeSet<String> {
    build
        .graph
        .of_type(kind)
        .into_iter()
        .map(|id| build.graph.onestop(id).unwrap())
        .collect()
}

#[test]
fn test_feed_identifier() {
    let build = build();
    assert_eq!(build.onestop().unwrap(), "f-9qs-dta");

    let gtfs = GtfsFeed::open(DTA).unwrap();
    assert_eq!(default_feed_id(&gtfs, "dta").unwrap(), "f-9qs-dta");
}

#[test]
fn test_single_operator() {
    let build = build();
    assert_eq!(
        onestops(&build, OnestopType::Operator),
        BTreeSet::from(["o-9qs-demotransitauthority".to_string()])
    );

    let operator = *build.operators().first().unwrap();
    let entity = build.graph.entity(operator);
    assert!(entity.identifiers().contains("gtfs://f-9qs-dta/o/DTA"));
    assert_eq!(entity.tags["agency_timezone"], "America/Los_Angeles");
    assert!(entity.geometry.is_some());
}

#[test]
fn test_routes() {
    let build = build();
    let expected: BTreeSet<String> = ["r-9qscy-10", "r-9qsb-20", "r-9qscy-30", "r-9qsczp-40", "r-9qt1-50"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(onestops(&build, OnestopType::Route), expected);

    for route in build.routes() {
        assert_eq!(build.graph.parents(route).len(), 1);
        assert_eq!(build.graph.entity(route).tags["vehicle_type"], "bus");
    }
}

#[test]
fn test_stops() {
    let build = build();
    let stops = onestops(&build, OnestopType::Stop);
    assert_eq!(stops.len(), 9);
    for expected in [
        "s-9qkxnx40xt-furnacecreekresortdemo",
        "s-9qscwx8n60-nyecountyairportdemo",
        "s-9qscv9zzb5-bullfrogdemo",
        "s-9qsfp2212t-stagecoachhotel~casinodemo",
        "s-9qsfnb5uz6-north~dndemo",
        "s-9qsfp00vhs-north~nademo",
        "s-9qscyz5vqg-doing~dndemo",
        "s-9qsczn2rk0-emain~sirvingdemo",
        "s-9qt0rnrkjt-amargosavalleydemo",
    ] {
        assert!(stops.contains(expected), "missing {}", expected);
    }

    let bullfrog = build.graph.find("s-9qscv9zzb5-bullfrogdemo").unwrap();
    assert_eq!(
        build.graph.served_by(bullfrog).unwrap(),
        BTreeSet::from(["o-9qs-demotransitauthority".to_string()])
    );
}

#[test]
fn test_operator_json() {
    let build = build();
    let operator = *build.operators().first().unwrap();
    let value = to_json(&build.graph, operator).unwrap();

    assert_eq!(value["type"], "FeatureCollection");
    assert_eq!(value["features"].as_array().unwrap().len(), 14);
    assert_eq!(value["serves"].as_array().unwrap().len(), 9);

    let ids: Vec<&str> = value["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["onestopId"].as_str().unwrap())
        .collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[test]
fn test_operator_json_round_trip() {
    let build = build();
    let operator = *build.operators().first().unwrap();
    let value = to_json(&build.graph, operator).unwrap();

    let (graph, loaded) = from_json(&value).unwrap();
    assert_eq!(graph.onestop(loaded).unwrap(), "o-9qs-demotransitauthority");
    assert_eq!(graph.routes(loaded).len(), 5);
    assert_eq!(graph.stops(loaded).len(), 9);
    assert_eq!(graph.entity(loaded).identifiers(), build.graph.entity(operator).identifiers());
    assert_eq!(to_json(&graph, loaded).unwrap(), value);
}

#[test]
fn test_feed_json() {
    let build = build();
    let value = to_json(&build.graph, build.feed).unwrap();

    assert_eq!(value["onestopId"], "f-9qs-dta");
    assert_eq!(value["feedFormat"], "gtfs");
    assert_eq!(value["operatorsInFeed"][0]["onestopId"], "o-9qs-demotransitauthority");
    assert_eq!(value["operatorsInFeed"][0]["gtfsAgencyId"], "DTA");
}

#[test]
fn test_route_datastore_payload() {
    let build = build();
    let route = build.graph.find("r-9qsb-20").unwrap();

    let with_rels = json_datastore(&build.graph, route, true).unwrap();
    assert_eq!(with_rels["operatedBy"], "o-9qs-demotransitauthority");
    assert!(with_rels.get("serves").is_some());
    assert!(with_rels.get("identifiers").is_none());

    let without_rels = json_datastore(&build.graph, route, false).unwrap();
    assert!(without_rels.get("serves").is_none());
    assert_eq!(without_rels["geometry"]["type"], "MultiLineString");
}

#[test]
fn test_merge_onestop_ids() {
    let build = build();
    let mut files = GtfsFiles::open(DTA).unwrap();
    let summary = merge_onestop_ids(&mut files, &build).unwrap();
    assert_eq!(summary, MergeSummary { agencies: 1, routes: 5, stops: 9, unmatched: 0 });

    let agency = files.table("agency.txt").unwrap();
    assert_eq!(agency.values(ONESTOP_ID_COLUMN).unwrap(), vec!["o-9qs-demotransitauthority"]);

    let routes = files.table("routes.txt").unwrap();
    let route_ids = routes.values("route_id").unwrap();
    let onestop_ids = routes.values(ONESTOP_ID_COLUMN).unwrap();
    let ab = route_ids.iter().position(|id| *id == "AB").unwrap();
    assert_eq!(onestop_ids[ab], "r-9qscy-10");

    let stops = files.table("stops.txt").unwrap();
    let stop_ids = stops.values("stop_id").unwrap();
    let onestop_ids = stops.values(ONESTOP_ID_COLUMN).unwrap();
    let bullfrog = stop_ids.iter().position(|id| *id == "BULLFROG").unwrap();
    assert_eq!(onestop_ids[bullfrog], "s-9qscv9zzb5-bullfrogdemo");
    // Columns the reader ignores are kept
    assert!(stops.column("zone_id").is_some());

    // Untouched tables are carried over
    assert_eq!(files.table("trips.txt").unwrap().len(), GtfsFeed::open(DTA).unwrap().trips.len());
}
