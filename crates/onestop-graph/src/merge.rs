//! Write derived Onestop IDs back into a GTFS dataset.
//!
//! Agencies, routes and stops gain an `onestop_id` column holding the
//! identifier of the entity built from each row. Rows that produced no
//! entity (stops without coordinates, routes without trips) get an empty
//! value. Every other file is carried over unchanged.

use crate::builder::{parse_reference, FeedBuild};
use crate::graph::EntityGraph;
use onestop_core::error::Result;
use onestop_core::formats::GtfsFiles;
use onestop_core::models::{mangle, OnestopType};
use serde::Serialize;
use std::collections::BTreeMap;

pub const ONESTOP_ID_COLUMN: &str = "onestop_id";

/// Rows that received an identifier, per table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeSummary {
    pub agencies: usize,
    pub routes: usize,
    pub stops: usize,
    pub unmatched: usize,
}

/// GTFS id to Onestop ID for every entity of one kind
pub fn gtfs_onestop_ids(graph: &EntityGraph, kind: OnestopType) -> Result<BTreeMap<String, String>> {
    let mut ids = BTreeMap::new();
    for id in graph.of_type(kind) {
        let onestop_id = graph.onestop(id)?;
        for identifier in graph.entity(id).identifiers() {
            if let Some((_, referenced, original_id)) = parse_reference(identifier) {
                if referenced == kind {
                    ids.insert(original_id.to_string(), onestop_id.clone());
                }
            }
        }
    }
    Ok(ids)
}

/// Add the `onestop_id` column to agency.txt, routes.txt and stops.txt
pub fn merge_onestop_ids(files: &mut GtfsFiles, build: &FeedBuild) -> Result<MergeSummary> {
    let mut summary = MergeSummary::default();

    let operators = gtfs_onestop_ids(&build.graph, OnestopType::Operator)?;
    let mut agency = files.table("agency.txt")?;
    let ids = agency.values("agency_id").unwrap_or_else(|| vec![""; agency.len()]);
    let names = agency.values("agency_name").unwrap_or_else(|| vec![""; agency.len()]);
    let keys: Vec<String> = ids
        .iter()
        .zip(&names)
        .map(|(id, name)| if id.is_empty() { mangle(name) } else { id.to_string() })
        .collect();
    let (values, matched) = assign(&keys, &operators);
    agency.set_column(ONESTOP_ID_COLUMN, values)?;
    files.set_table(&agency)?;
    summary.agencies = matched;
    summary.unmatched += keys.len() - matched;

    for (name, key, kind) in [
        ("routes.txt", "route_id", OnestopType::Route),
        ("stops.txt", "stop_id", OnestopType::Stop),
    ] {
        let onestop_ids = gtfs_onestop_ids(&build.graph, kind)?;
        let mut table = files.table(name)?;
        let keys: Vec<String> = table
            .values(key)
            .unwrap_or_else(|| vec![""; table.len()])
            .into_iter()
            .map(str::to_string)
            .collect();
        let (values, matched) = assign(&keys, &onestop_ids);
        table.set_column(ONESTOP_ID_COLUMN, values)?;
        files.set_table(&table)?;

        match kind {
            OnestopType::Route => summary.routes = matched,
            _ => summary.stops = matched,
        }
        summary.unmatched += keys.len() - matched;
    }

    tracing::info!(
        "Merged Onestop IDs into {} agencies, {} routes and {} stops ({} rows unmatched)",
        summary.agencies,
        summary.routes,
        summary.stops,
        summary.unmatched
    );
    Ok(summary)
}

/// Column values for `keys`, and how many of them were found
fn assign(keys: &[String], onestop_ids: &BTreeMap<String, String>) -> (Vec<String>, usize) {
    let values: Vec<String> =
        keys.iter().map(|key| onestop_ids.get(key).cloned().unwrap_or_default()).collect();
    let matched = values.iter().filter(|value| !value.is_empty()).count();
    (values, matched)
}
