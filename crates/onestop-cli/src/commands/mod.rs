//! Command implementations

mod bootstrap;
mod diff;
mod export;
mod fetch;
mod info;
mod init;
mod merge;
mod publish;
mod stops;
mod update;

use crate::cli::{Cli, Commands};
use crate::config_loader::load_config;
use crate::dry_run::{ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::{FeedOutput, OperatorSummary};
use anyhow::{bail, Context, Result};
use onestop_core::formats::GtfsFeed;
use onestop_core::OnestopError;
use onestop_graph::FeedBuild;
use onestop_store::{FeedRegistry, StopBinIndex};
use std::collections::BTreeMap;
use std::path::Path;

/// Execute a CLI command
pub fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Init(args) => init::execute(args, &output, cli.dry_run, &config),
        Commands::Bootstrap(args) => bootstrap::execute(args, &output, cli.dry_run, &config),
        Commands::Update(args) => update::execute(args, &output, cli.dry_run, &config),
        Commands::Export(args) => export::execute(args, &output),
        Commands::Fetch(args) => fetch::execute(args, &output, cli.dry_run, &config),
        Commands::Publish(args) => publish::execute(args, &output, cli.dry_run, &config),
        Commands::Info(args) => info::execute(args, &output, &config),
        Commands::Stops(args) => stops::execute(args, &output, &config),
        Commands::Merge(args) => merge::execute(args, &output, cli.dry_run),
        Commands::Diff(args) => diff::execute(args, &output),
    }
}

fn open_gtfs(path: &Path) -> Result<GtfsFeed> {
    GtfsFeed::open(path).with_context(|| format!("Failed to read GTFS from {}", path.display()))
}

/// Parse repeated `key=value` flags
fn parse_tags(tags: &[String]) -> Result<BTreeMap<String, String>> {
    let mut parsed = BTreeMap::new();
    for tag in tags {
        match tag.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                parsed.insert(key.to_string(), value.to_string());
            }
            _ => bail!("Invalid tag '{}': expected key=value", tag),
        }
    }
    Ok(parsed)
}

/// Counts of a build, before anything is written
fn summarize(build: &FeedBuild) -> Result<FeedOutput> {
    let graph = &build.graph;
    let feed = graph.entity(build.feed);
    let mut operators = Vec::new();
    for operator in build.operators() {
        operators.push(OperatorSummary {
            onestop_id: graph.onestop(operator)?,
            name: graph.entity(operator).name().unwrap_or_default().to_string(),
            routes: graph.routes(operator).len(),
            stops: graph.stops(operator).len(),
        });
    }
    Ok(FeedOutput {
        onestop_id: build.onestop()?,
        name: feed.name().unwrap_or_default().to_string(),
        sha1: feed.feed_info().and_then(|info| info.sha1.clone()),
        operators,
        routes: build.routes().len(),
        stops: build.stops().len(),
        stop_bins: 0,
        files: Vec::new(),
    })
}

/// Actions a registry write would perform
fn planned_writes(registry: &FeedRegistry, summary: &FeedOutput) -> Vec<PlannedAction> {
    let mut actions = vec![PlannedAction::new(
        ActionType::WriteFile,
        registry.feed_path(&summary.onestop_id).display().to_string(),
    )
    .with_detail(format!("Operators: {}", summary.operators.len()))
    .with_detail(format!("Routes: {}", summary.routes))
    .with_detail(format!("Stops: {}", summary.stops))];
    for operator in &summary.operators {
        actions.push(
            PlannedAction::new(
                ActionType::WriteFile,
                registry.operator_path(&operator.onestop_id).display().to_string(),
            )
            .with_detail(format!("Routes: {}", operator.routes))
            .with_detail(format!("Stops: {}", operator.stops)),
        );
    }
    actions
}

/// Write the feed, its operators, and its stops merged into the stored bins
fn write_build(
    registry: &FeedRegistry,
    build: &FeedBuild,
    overwrite: bool,
    prefix_length: usize,
) -> Result<FeedOutput> {
    let mut summary = summarize(build)?;

    if !overwrite {
        let mut paths = vec![registry.feed_path(&summary.onestop_id)];
        paths.extend(summary.operators.iter().map(|o| registry.operator_path(&o.onestop_id)));
        if let Some(path) = paths.into_iter().find(|path| path.exists()) {
            return Err(OnestopError::RegistryEntryExists { path }.into());
        }
    }

    let path = registry.write_feed(&build.graph, build.feed, overwrite)?;
    summary.files.push(path.display().to_string());
    for operator in build.operators() {
        let path = registry.write_operator(&build.graph, operator, overwrite)?;
        summary.files.push(path.display().to_string());
    }

    let mut fresh = StopBinIndex::new(prefix_length);
    fresh.add_graph(&build.graph)?;
    let stored = registry.stop_bins()?;
    let mut index = StopBinIndex::new(prefix_length);
    for bin in fresh.bins() {
        if stored.iter().any(|prefix| prefix == bin.prefix()) {
            index.add_bin(registry.stop_bin(bin.prefix())?)?;
        }
    }
    index.add_graph(&build.graph)?;
    for bin in index.bins() {
        let path = registry.write_stop_bin(bin)?;
        summary.files.push(path.display().to_string());
    }
    summary.stop_bins = index.len();

    tracing::info!("Wrote {} registry files for {}", summary.files.len(), summary.onestop_id);
    Ok(summary)
}

/// Report a written or planned feed
fn report_feed(output: &OutputWriter, summary: FeedOutput, verb: &str) -> Result<()> {
    if output.is_json() {
        return output.result(summary);
    }
    output.success(format!("{} {}", verb, summary.onestop_id));
    output.kv("Name", &summary.name);
    if let Some(sha1) = &summary.sha1 {
        output.kv("SHA-1", sha1);
    }
    output.kv("Routes", summary.routes);
    output.kv("Stops", summary.stops);
    output.kv("Stop bins", summary.stop_bins);
    output.section("Operators");
    output.table(summary.operators);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags(&["license=CC-BY".to_string(), "note=a=b".to_string()]).unwrap();
        assert_eq!(tags["license"], "CC-BY");
        assert_eq!(tags["note"], "a=b");

        assert!(parse_tags(&["missing".to_string()]).is_err());
        assert!(parse_tags(&["=value".to_string()]).is_err());
    }
}
