//! Stops command implementation

use crate::cli::StopsArgs;
use crate::config_loader::open_registry;
use crate::output::OutputWriter;
use crate::output_types::StopRow;
use anyhow::{bail, Context, Result};
use onestop_core::config::LayeredConfig;
use onestop_graph::{Entity, EntityGraph, EntityId};
use onestop_store::datastore::find_stops;
use onestop_store::{HttpDatastore, StopBinIndex, StopQuery};

fn stop_row(stop: &Entity, onestop_id: String) -> StopRow {
    StopRow {
        onestop_id,
        name: stop.name().unwrap_or_default().to_string(),
        served_by: stop.relations.served_by.iter().cloned().collect::<Vec<_>>().join(", "),
    }
}

pub fn execute(args: StopsArgs, output: &OutputWriter, config: &LayeredConfig) -> Result<()> {
    let rows = match (&args.identifier, args.lon, args.lat) {
        (_, Some(lon), Some(lat)) if args.local => local_stops(config, lon, lat, args.radius)?,
        (_, Some(lon), Some(lat)) => {
            remote_stops(config, &StopQuery::Near { lon, lat, radius: args.radius })?
        }
        (Some(identifier), _, _) => remote_stops(config, &StopQuery::Identifier(identifier.clone()))?,
        _ => bail!("Give --identifier, or --lon and --lat"),
    };

    if output.is_json() {
        return output.result(rows);
    }
    output.success(format!("Found {} stops", rows.len()));
    output.table(rows);
    Ok(())
}

fn remote_stops(config: &LayeredConfig, query: &StopQuery) -> Result<Vec<StopRow>> {
    let store = HttpDatastore::new(&config.datastore_url.value, config.auth_token.value.clone());
    let (graph, found) = find_stops(&store, query)
        .with_context(|| format!("Failed to look up stops at {}", store.endpoint()))?;
    stop_rows(&graph, &found)
}

fn stop_rows(graph: &EntityGraph, found: &[EntityId]) -> Result<Vec<StopRow>> {
    found.iter().map(|id| Ok(stop_row(graph.entity(*id), graph.onestop(*id)?))).collect()
}

/// Search the registry stop bins around a point
fn local_stops(config: &LayeredConfig, lon: f64, lat: f64, radius: u32) -> Result<Vec<StopRow>> {
    let registry = open_registry(config)?;
    let mut index = StopBinIndex::new(config.stop_bin_prefix_length.value);
    for prefix in registry.stop_bins()? {
        index.add_bin(registry.stop_bin(&prefix)?)?;
    }

    let mut rows = Vec::new();
    for stop in index.stops_near(lon, lat, f64::from(radius))? {
        let onestop_id = stop.cached_onestop().unwrap_or_default().to_string();
        rows.push(stop_row(stop, onestop_id));
    }
    rows.sort_by(|a, b| a.onestop_id.cmp(&b.onestop_id));
    Ok(rows)
}
