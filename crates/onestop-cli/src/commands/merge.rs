//! Merge command implementation

use super::open_gtfs;
use crate::cli::MergeArgs;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::MergeOutput;
use anyhow::{bail, Context, Result};
use onestop_core::formats::GtfsFiles;
use onestop_graph::{build_feed, merge_onestop_ids, FeedOptions};

pub fn execute(args: MergeArgs, output: &OutputWriter, dry_run: bool) -> Result<()> {
    if args.outfile.exists() && !args.force {
        bail!("Output file {} already exists; use --force to overwrite it", args.outfile.display());
    }

    let gtfs = open_gtfs(&args.filename)?;
    let mut options = FeedOptions::new(&args.name);
    options.feed_id = args.feed_id.clone();
    let build = build_feed(&gtfs, options)
        .with_context(|| format!("Failed to build feed '{}'", args.name))?;

    let mut files = GtfsFiles::open(&args.filename)
        .with_context(|| format!("Failed to read GTFS from {}", args.filename.display()))?;
    let summary = merge_onestop_ids(&mut files, &build)?;
    let result = MergeOutput {
        feed: build.onestop()?,
        output: args.outfile.display().to_string(),
        summary,
    };

    if dry_run {
        let action = PlannedAction::new(ActionType::WriteFile, &result.output)
            .with_detail(format!("Feed: {}", result.feed))
            .with_detail(format!("Agencies: {}", result.summary.agencies))
            .with_detail(format!("Routes: {}", result.summary.routes))
            .with_detail(format!("Stops: {}", result.summary.stops));
        return display_planned_actions(output, &[action]);
    }

    files
        .write_zip(&args.outfile)
        .with_context(|| format!("Failed to write {}", args.outfile.display()))?;

    if output.is_json() {
        return output.result(result);
    }
    output.success(format!("Wrote {}", result.output));
    output.kv("Feed", &result.feed);
    output.kv("Agencies", result.summary.agencies);
    output.kv("Routes", result.summary.routes);
    output.kv("Stops", result.summary.stops);
    if result.summary.unmatched > 0 {
        output.warning(format!("{} rows have no Onestop ID", result.summary.unmatched));
    }
    Ok(())
}
