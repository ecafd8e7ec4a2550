//! Diff command implementation

use crate::cli::DiffArgs;
use crate::output::OutputWriter;
use crate::output_types::DiffOutput;
use anyhow::{Context, Result};
use onestop_core::formats::{diff_keys, GtfsFiles, Table};
use onestop_geo::geohash::{encode, MAX_LENGTH};
use std::collections::BTreeSet;
use std::path::Path;

const DEFAULT_KEY: &str = "route_short_name";

pub fn execute(args: DiffArgs, output: &OutputWriter) -> Result<()> {
    let (first, second) = if args.flip {
        (&args.filename2, &args.filename1)
    } else {
        (&args.filename1, &args.filename2)
    };
    let keys = if args.keys.is_empty() { vec![DEFAULT_KEY.to_string()] } else { args.keys.clone() };

    let before = read_table(first, &args.table)?;
    let after = read_table(second, &args.table)?;
    let result = DiffOutput {
        diff: diff_keys(&before, &after, &keys),
        table: args.table,
        keys,
    };

    if output.is_json() {
        return output.result(result);
    }
    output.kv("Table", &result.table);
    output.kv("Keys", result.keys.join(", "));
    print_keys(output, "Found", &result.diff.found);
    print_keys(output, "Lost", &result.diff.lost);
    print_keys(output, "New", &result.diff.new);
    Ok(())
}

fn print_keys(output: &OutputWriter, title: &str, keys: &BTreeSet<Vec<String>>) {
    output.section(format!("{} ({})", title, keys.len()));
    for key in keys {
        output.info(key.join(" | "));
    }
}

fn read_table(path: &Path, name: &str) -> Result<Table> {
    let files = GtfsFiles::open(path)
        .with_context(|| format!("Failed to read GTFS from {}", path.display()))?;
    let mut table = files.table(name)?;
    if name == "stops.txt" {
        add_geohash(&mut table)?;
    }
    Ok(table)
}

/// Add a `geohash` column computed from stop coordinates
fn add_geohash(table: &mut Table) -> Result<()> {
    let (Some(lats), Some(lons)) = (table.values("stop_lat"), table.values("stop_lon")) else {
        return Ok(());
    };
    let hashes: Vec<String> = lats
        .iter()
        .zip(&lons)
        .map(|(lat, lon)| match (lat.parse::<f64>(), lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => encode(lat, lon, MAX_LENGTH),
            _ => String::new(),
        })
        .collect();
    table.set_column("geohash", hashes)?;
    Ok(())
}
