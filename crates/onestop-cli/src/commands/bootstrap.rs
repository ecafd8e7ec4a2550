//! Bootstrap command implementation

use super::{open_gtfs, parse_tags, planned_writes, report_feed, summarize, write_build};
use crate::cli::BootstrapArgs;
use crate::config_loader::open_registry;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use onestop_core::config::LayeredConfig;
use onestop_core::models::mangle;
use onestop_core::OnestopError;
use onestop_graph::{build_feed, FeedOptions};
use onestop_store::{download, sha1_file};
use std::fs;
use std::path::PathBuf;

pub fn execute(
    args: BootstrapArgs,
    output: &OutputWriter,
    dry_run: bool,
    config: &LayeredConfig,
) -> Result<()> {
    let registry = open_registry(config)?;
    let tags = parse_tags(&args.tags)?;

    let (path, sha1, downloaded): (PathBuf, Option<String>, bool) = match (&args.filename, &args.url) {
        (Some(filename), _) => {
            let sha1 = if filename.is_file() { Some(sha1_file(filename)?) } else { None };
            (filename.clone(), sha1, false)
        }
        (None, Some(url)) => {
            // Kept under the feed name until the Onestop ID is known
            let destination = registry.data_path(&mangle(&args.name));
            if dry_run {
                let actions = vec![PlannedAction::new(ActionType::Download, url.clone())
                    .with_detail(format!("Destination: {}", destination.display()))
                    .with_detail("Feed and operators are written after the build")];
                return display_planned_actions(output, &actions);
            }
            let fetched = download(url, &destination, None, config.cache_policy.value)
                .with_context(|| format!("Failed to download {}", url))?;
            (fetched.path, Some(fetched.sha1), true)
        }
        (None, None) => anyhow::bail!("Give a GTFS source with --filename or --url"),
    };

    let gtfs = open_gtfs(&path)?;
    let mut options = FeedOptions::new(&args.name);
    options.url = args.url.clone();
    options.sha1 = sha1;
    options.tags = tags;
    let build = build_feed(&gtfs, options)
        .with_context(|| format!("Failed to build feed '{}'", args.name))?;
    let feed_id = build.onestop()?;

    if !args.force && registry.feed_path(&feed_id).exists() {
        return Err(OnestopError::RegistryEntryExists { path: registry.feed_path(&feed_id) }.into());
    }

    if dry_run {
        let summary = summarize(&build)?;
        return display_planned_actions(output, &planned_writes(&registry, &summary));
    }

    let summary = write_build(&registry, &build, args.force, config.stop_bin_prefix_length.value)?;

    if downloaded {
        let archive = registry.data_path(&feed_id);
        if archive != path {
            fs::rename(&path, &archive)
                .with_context(|| format!("Failed to move archive to {}", archive.display()))?;
        }
    }

    report_feed(output, summary, "Bootstrapped")
}
