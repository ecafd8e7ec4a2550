use console::style;
use onestop_core::error::OnestopError;
use std::fmt;
use std::path::Path;

/// Error with context and suggestions for the terminal
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
    pub help_command: Option<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
            help_command: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, command: impl Into<String>) -> Self {
        self.help_command = Some(command.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
            eprintln!();
        }

        if let Some(ref help_cmd) = self.help_command {
            eprintln!("{} {}", style("Need help?").cyan(), style(help_cmd).cyan().bold());
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn registry_not_found(path: &Path) -> CliError {
    CliError::new("Not a feed registry")
        .with_context(format!("No feeds directory found.\n\nRegistry path: {}", path.display()))
        .with_suggestion("Create a registry: onestop init")
        .with_suggestion("Or point to an existing one: --registry <PATH>")
        .with_help("Run: onestop init --help")
}

pub fn entry_exists(path: &Path) -> CliError {
    CliError::new("Registry entry already exists")
        .with_context(format!("Path: {}", path.display()))
        .with_suggestion("Refresh a registered feed: onestop update <FEED>")
        .with_suggestion("Or overwrite it: onestop bootstrap --force")
        .with_help("Run: onestop bootstrap --help")
}

pub fn checksum_mismatch(path: &Path, expected: &str, actual: &str) -> CliError {
    CliError::new("Downloaded feed does not match its registered SHA-1")
        .with_context(format!(
            "Path: {}\nExpected: {}\nActual:   {}",
            path.display(),
            expected,
            actual
        ))
        .with_suggestion("Accept the new archive: --cache refresh")
        .with_suggestion("Or check the feed url in the registry")
}

pub fn no_feeds() -> CliError {
    CliError::new("No feeds specified")
        .with_context("Give one or more feed Onestop IDs.")
        .with_suggestion("Update every registered feed: onestop update --all")
        .with_suggestion("List registered feeds: onestop info")
        .with_help("Run: onestop update --help")
}

pub fn datastore_failed(reason: &str) -> CliError {
    CliError::new("Datastore request failed")
        .with_context(format!("Error: {}", reason))
        .with_suggestion("Set the endpoint: --datastore <URL> or TRANSITLAND_DATASTORE_URL")
        .with_suggestion("Set the API token: TRANSITLAND_DATASTORE_AUTH_TOKEN")
        .with_help("Run: onestop info --show-config")
}

pub fn invalid_config(key: &str, reason: &str) -> CliError {
    CliError::new(format!("Invalid configuration: {}", key))
        .with_context(format!("Reason: {}", reason))
        .with_suggestion("Check onestop.toml for syntax errors")
        .with_help("Run: onestop info --show-config")
}

/// Convert an anyhow chain into a CliError, keeping the outermost message
pub fn from_anyhow(error: anyhow::Error) -> CliError {
    if let Some(cli_error) = error.downcast_ref::<CliError>() {
        return CliError {
            message: cli_error.message.clone(),
            context: cli_error.context.clone(),
            suggestions: cli_error.suggestions.clone(),
            help_command: cli_error.help_command.clone(),
        };
    }

    let message = format!("{:#}", error);
    match error.downcast_ref::<OnestopError>() {
        Some(OnestopError::InvalidRegistry { path }) => registry_not_found(path),
        Some(OnestopError::RegistryEntryExists { path }) => entry_exists(path),
        Some(OnestopError::InvalidChecksum { path, expected, actual }) => {
            checksum_mismatch(path, expected, actual)
        }
        Some(OnestopError::Datastore { reason }) => datastore_failed(reason),
        Some(OnestopError::ConfigInvalid { key, reason }) => invalid_config(key, reason),
        Some(OnestopError::MissingGtfsFile { name }) => CliError::new("Incomplete GTFS feed")
            .with_context(format!("Missing file: {}", name))
            .with_suggestion("Check that the archive is a GTFS feed"),
        _ => CliError::new(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn test_maps_registry_errors() {
        let error: anyhow::Result<()> =
            Err(OnestopError::InvalidRegistry { path: PathBuf::from("/tmp/none") })
                .context("Failed to open registry");
        let cli_error = from_anyhow(error.unwrap_err());
        assert_eq!(cli_error.message, "Not a feed registry");
        assert!(!cli_error.suggestions.is_empty());
    }

    #[test]
    fn test_keeps_cli_errors() {
        let cli_error = from_anyhow(no_feeds().into());
        assert_eq!(cli_error.message, "No feeds specified");
        assert_eq!(cli_error.help_command.as_deref(), Some("Run: onestop update --help"));
    }

    #[test]
    fn test_other_errors_keep_chain() {
        let error = anyhow::anyhow!("boom").context("Failed to build feed");
        assert_eq!(from_anyhow(error).message, "Failed to build feed: boom");
    }
}
