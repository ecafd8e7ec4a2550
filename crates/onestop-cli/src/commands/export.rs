//! Export command implementation

use super::open_gtfs;
use crate::cli::ExportArgs;
use crate::output::OutputWriter;
use anyhow::{bail, Context, Result};
use onestop_graph::{build_feed, to_json, FeedOptions};
use serde_json::Value;

pub fn execute(args: ExportArgs, output: &OutputWriter) -> Result<()> {
    let gtfs = open_gtfs(&args.filename)?;
    let build = build_feed(&gtfs, FeedOptions::new(&args.name))
        .with_context(|| format!("Failed to build feed '{}'", args.name))?;

    if args.feed {
        return output.data(&to_json(&build.graph, build.feed)?);
    }

    let mut records = Vec::new();
    for operator in build.operators() {
        let onestop_id = build.graph.onestop(operator)?;
        if args.operator.as_deref().is_some_and(|wanted| wanted != onestop_id) {
            continue;
        }
        records.push(to_json(&build.graph, operator)?);
    }

    match (records.len(), &args.operator) {
        (0, Some(wanted)) => bail!("Operator {} is not in feed {}", wanted, build.onestop()?),
        (1, _) => output.data(&records[0]),
        _ => output.data(&Value::Array(records)),
    }
}
