//! Fetch command implementation

use crate::cli::FetchArgs;
use crate::config_loader::open_registry;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::FetchOutput;
use anyhow::{Context, Result};
use onestop_core::config::LayeredConfig;
use onestop_store::download;

pub fn execute(
    args: FetchArgs,
    output: &OutputWriter,
    dry_run: bool,
    config: &LayeredConfig,
) -> Result<()> {
    let registry = open_registry(config)?;
    let feeds = if args.feeds.is_empty() { registry.feeds()? } else { args.feeds };
    let policy = config.cache_policy.value;

    let mut actions = Vec::new();
    let mut rows = Vec::new();
    for feed_id in &feeds {
        let (graph, feed) = registry
            .feed(feed_id)
            .with_context(|| format!("Failed to load feed {} from the registry", feed_id))?;
        let info = graph.entity(feed).feed_info().cloned().unwrap_or_default();
        let Some(url) = info.url else {
            output.warning(format!("Feed {} has no url, skipping", feed_id));
            continue;
        };
        let destination = registry.data_path(feed_id);

        if dry_run {
            actions.push(
                PlannedAction::new(ActionType::Download, url)
                    .with_detail(format!("Destination: {}", destination.display()))
                    .with_detail(format!("Cache policy: {}", policy)),
            );
            continue;
        }

        let fetched = download(&url, &destination, info.sha1.as_deref(), policy)
            .with_context(|| format!("Failed to download feed {}", feed_id))?;
        rows.push(FetchOutput {
            feed: feed_id.clone(),
            path: fetched.path.display().to_string(),
            sha1: fetched.sha1,
            cached: fetched.cached,
        });
    }

    if dry_run {
        return display_planned_actions(output, &actions);
    }
    if output.is_json() {
        return output.result(rows);
    }
    output.success(format!("Fetched {} of {} feeds", rows.len(), feeds.len()));
    output.table(rows);
    Ok(())
}
