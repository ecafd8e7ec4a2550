//! Update command implementation

use super::{open_gtfs, planned_writes, report_feed, summarize, write_build};
use crate::cli::UpdateArgs;
use crate::config_loader::open_registry;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::errors::no_feeds;
use crate::output::OutputWriter;
use anyhow::{anyhow, bail, Context, Result};
use onestop_core::config::LayeredConfig;
use onestop_graph::{build_feed, FeedOptions};
use onestop_store::{download, sha1_file};

pub fn execute(
    args: UpdateArgs,
    output: &OutputWriter,
    dry_run: bool,
    config: &LayeredConfig,
) -> Result<()> {
    let registry = open_registry(config)?;
    let feeds = if args.all { registry.feeds()? } else { args.feeds.clone() };
    if feeds.is_empty() {
        return Err(no_feeds().into());
    }
    if feeds.len() > 1 && args.filename.is_some() {
        bail!("--filename can only be used when updating a single feed");
    }

    let mut actions = Vec::new();
    for feed_id in &feeds {
        let (stored, feed) = registry
            .feed(feed_id)
            .with_context(|| format!("Failed to load feed {} from the registry", feed_id))?;
        let entity = stored.entity(feed);
        let info = entity.feed_info().cloned().unwrap_or_default();
        let name = entity.name().unwrap_or(feed_id.as_str()).to_string();

        let (path, sha1) = match &args.filename {
            Some(filename) => {
                let sha1 = if filename.is_file() { Some(sha1_file(filename)?) } else { None };
                (filename.clone(), sha1)
            }
            None => {
                let url = info
                    .url
                    .clone()
                    .ok_or_else(|| anyhow!("Feed {} has no url; use --filename", feed_id))?;
                let destination = registry.data_path(feed_id);
                if dry_run {
                    actions.push(
                        PlannedAction::new(ActionType::Download, url)
                            .with_detail(format!("Destination: {}", destination.display()))
                            .with_detail(format!("Cache policy: {}", config.cache_policy.value)),
                    );
                    continue;
                }
                let fetched = download(&url, &destination, info.sha1.as_deref(), config.cache_policy.value)
                    .with_context(|| format!("Failed to download feed {}", feed_id))?;
                (fetched.path, Some(fetched.sha1))
            }
        };

        let gtfs = open_gtfs(&path)?;
        let mut options = FeedOptions::new(name).with_feed_id(feed_id);
        options.url = info.url.clone();
        options.sha1 = sha1;
        options.tags = entity.tags.clone();
        let mut build = build_feed(&gtfs, options)
            .with_context(|| format!("Failed to rebuild feed {}", feed_id))?;

        // Registered feeds keep their Onestop ID even if their stops moved
        let derived = build.onestop()?;
        if &derived != feed_id {
            tracing::warn!("Feed {} now derives {}; keeping the registered ID", feed_id, derived);
            build.graph.entity_mut(build.feed).set_onestop(feed_id.clone());
        }

        if dry_run {
            actions.extend(planned_writes(&registry, &summarize(&build)?));
            continue;
        }
        let summary = write_build(&registry, &build, true, config.stop_bin_prefix_length.value)?;
        report_feed(output, summary, "Updated")?;
    }

    if dry_run {
        return display_planned_actions(output, &actions);
    }
    Ok(())
}
