//! Publish command implementation

use crate::cli::PublishArgs;
use crate::config_loader::open_registry;
use crate::dry_run::{display_planned_actions, ActionType, PlannedAction};
use crate::output::OutputWriter;
use crate::output_types::PublishOutput;
use anyhow::{Context, Result};
use onestop_core::config::LayeredConfig;
use onestop_store::datastore::update_operator;
use onestop_store::HttpDatastore;

pub fn execute(
    args: PublishArgs,
    output: &OutputWriter,
    dry_run: bool,
    config: &LayeredConfig,
) -> Result<()> {
    let registry = open_registry(config)?;
    let operators = if args.operators.is_empty() { registry.operators()? } else { args.operators };
    let store = HttpDatastore::new(&config.datastore_url.value, config.auth_token.value.clone());
    if config.auth_token.value.is_none() {
        output.warning("No datastore token configured; requests are sent unauthenticated");
    }

    let mut actions = Vec::new();
    let mut rows = Vec::new();
    for onestop_id in &operators {
        let (graph, operator) = registry
            .operator(onestop_id)
            .with_context(|| format!("Failed to load operator {} from the registry", onestop_id))?;

        if dry_run {
            let routes = graph.routes(operator).len();
            let stops = graph.stops(operator).len();
            actions.push(
                PlannedAction::new(
                    ActionType::PostChangeset,
                    format!("Publish {} to {}", onestop_id, store.changesets_url()),
                )
                .with_detail(format!("Routes: {}", routes))
                .with_detail(format!("Stops: {}", stops))
                .with_detail(format!("Changesets: {}", 2 + routes + 2 * stops)),
            );
            continue;
        }

        let changesets = update_operator(&store, &graph, operator)
            .with_context(|| format!("Failed to publish operator {}", onestop_id))?;
        rows.push(PublishOutput { operator: onestop_id.clone(), changesets });
    }

    if dry_run {
        return display_planned_actions(output, &actions);
    }
    if output.is_json() {
        return output.result(rows);
    }
    output.success(format!("Published {} operators to {}", rows.len(), store.endpoint()));
    output.table(rows);
    Ok(())
}
