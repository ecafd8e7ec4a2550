//! Init command implementation

use crate::cli::InitArgs;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::InitOutput;
use anyhow::{Context, Result};
use onestop_core::config::LayeredConfig;
use onestop_store::registry::{DATA_DIR, FEEDS_DIR, OPERATORS_DIR, STOPS_DIR};
use onestop_store::FeedRegistry;

pub fn execute(
    args: InitArgs,
    output: &OutputWriter,
    dry_run: bool,
    config: &LayeredConfig,
) -> Result<()> {
    let path = args.path.unwrap_or_else(|| config.registry_path.value.clone());
    let directories: Vec<String> =
        [FEEDS_DIR, OPERATORS_DIR, STOPS_DIR, DATA_DIR].iter().map(|d| d.to_string()).collect();

    if dry_run {
        let actions: Vec<PlannedAction> = directories
            .iter()
            .map(|dir| {
                PlannedAction::new(
                    ActionType::CreateDirectory,
                    path.join(dir).display().to_string(),
                )
            })
            .collect();
        return display_planned_actions(output, &actions);
    }

    let registry = FeedRegistry::init(&path)
        .with_context(|| format!("Failed to create registry at {}", path.display()))?;

    if output.is_json() {
        output.result(InitOutput {
            registry_path: registry.path().display().to_string(),
            directories,
        })?;
    } else {
        output.success(format!("Initialized feed registry at {}", registry.path().display()));
        output.section("Directories");
        for dir in &directories {
            output.kv(dir, registry.path().join(dir).display());
        }
    }

    Ok(())
}
