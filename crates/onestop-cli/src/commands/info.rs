//! Info command implementation

use crate::cli::InfoArgs;
use crate::config_loader::open_registry;
use crate::output::OutputWriter;
use crate::output_types::{ConfigRow, FeedRow, InfoOutput};
use anyhow::{bail, Result};
use onestop_core::config::LayeredConfig;
use onestop_core::models::OnestopType;
use onestop_graph::to_json;
use onestop_store::FeedRegistry;

pub fn execute(args: InfoArgs, output: &OutputWriter, config: &LayeredConfig) -> Result<()> {
    if args.show_config {
        return show_config(output, config);
    }

    let registry = open_registry(config)?;
    match args.onestop_id {
        Some(onestop_id) => show_entity(output, &registry, &onestop_id),
        None => show_registry(output, &registry),
    }
}

fn show_config(output: &OutputWriter, config: &LayeredConfig) -> Result<()> {
    let mut rows: Vec<ConfigRow> = config
        .to_inspection_map()
        .into_iter()
        .map(|(key, (value, source))| ConfigRow { key, value, source: format!("{:?}", source) })
        .collect();
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    if output.is_json() {
        return output.result(rows);
    }
    output.section("Configuration");
    output.table(rows);
    Ok(())
}

fn show_entity(output: &OutputWriter, registry: &FeedRegistry, onestop_id: &str) -> Result<()> {
    let (graph, id) = match OnestopType::of(onestop_id)? {
        OnestopType::Feed => registry.feed(onestop_id)?,
        OnestopType::Operator => registry.operator(onestop_id)?,
        other => bail!("{} entities are kept in stop bins and operators, not on their own", other),
    };
    output.result(to_json(&graph, id)?)
}

fn show_registry(output: &OutputWriter, registry: &FeedRegistry) -> Result<()> {
    let mut feeds = Vec::new();
    for onestop_id in registry.feeds()? {
        let (graph, feed) = registry.feed(&onestop_id)?;
        let entity = graph.entity(feed);
        feeds.push(FeedRow {
            name: entity.name().unwrap_or_default().to_string(),
            url: entity.feed_info().and_then(|info| info.url.clone()).unwrap_or_default(),
            operators: graph.operators_in_feed(feed)?.len(),
            onestop_id,
        });
    }
    let info = InfoOutput {
        registry_path: registry.path().display().to_string(),
        feeds,
        operators: registry.operators()?,
        stop_bins: registry.stop_bins()?,
    };

    if output.is_json() {
        return output.result(info);
    }
    output.kv("Registry", &info.registry_path);
    output.section("Feeds");
    output.table(info.feeds);
    output.section("Operators");
    for operator in &info.operators {
        output.info(operator);
    }
    output.kv("Stop bins", info.stop_bins.len());
    Ok(())
}
