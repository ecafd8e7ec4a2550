use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Onestop - transit feed registry tools
#[derive(Parser, Debug)]
#[command(name = "onestop")]
#[command(about = "Build and publish an Onestop feed registry from GTFS", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Show planned actions without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Configuration file (defaults to onestop.toml in the registry)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Feed registry path
    #[arg(long, global = true, value_name = "PATH")]
    pub registry: Option<PathBuf>,

    /// Datastore endpoint
    #[arg(long, global = true, value_name = "URL")]
    pub datastore: Option<String>,

    /// Download cache policy (cache, reuse, or refresh)
    #[arg(long, global = true, value_name = "POLICY")]
    pub cache: Option<String>,

    /// Geohash prefix length of stop bins (1-10)
    #[arg(long, global = true, value_name = "LENGTH")]
    pub stopbin_prefix: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty feed registry
    Init(InitArgs),

    /// Register a new feed from a GTFS file or url
    Bootstrap(BootstrapArgs),

    /// Download and rebuild registered feeds
    Update(UpdateArgs),

    /// Print the Onestop JSON of a GTFS dataset without writing the registry
    Export(ExportArgs),

    /// Download the GTFS archives of registered feeds
    Fetch(FetchArgs),

    /// Publish registered operators to the datastore
    Publish(PublishArgs),

    /// Show the registry contents and effective configuration
    Info(InfoArgs),

    /// Look up stops by identifier or location
    Stops(StopsArgs),

    /// Write derived Onestop IDs into a copy of a GTFS dataset
    Merge(MergeArgs),

    /// Compare one GTFS table between two datasets
    Diff(DiffArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Registry directory (defaults to --registry or the current directory)
    pub path: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct BootstrapArgs {
    /// Feed name
    #[arg(long)]
    pub name: String,

    /// GTFS zip archive or unpacked directory
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    pub filename: Option<PathBuf>,

    /// GTFS url; the archive is kept in the registry data directory
    #[arg(long)]
    pub url: Option<String>,

    /// Tag to attach to the feed, as key=value (repeatable)
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    pub tags: Vec<String>,

    /// Overwrite existing registry entries
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    /// Feed Onestop IDs
    pub feeds: Vec<String>,

    /// Update every registered feed
    #[arg(long, conflicts_with = "feeds")]
    pub all: bool,

    /// Use a local GTFS file instead of the feed url (single feed only)
    #[arg(long)]
    pub filename: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// GTFS zip archive or unpacked directory
    pub filename: PathBuf,

    /// Feed name
    #[arg(long)]
    pub name: String,

    /// Export the feed record instead of its operators
    #[arg(long)]
    pub feed: bool,

    /// Only export this operator
    #[arg(long, value_name = "ONESTOP_ID")]
    pub operator: Option<String>,
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Feed Onestop IDs (defaults to every registered feed)
    pub feeds: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct PublishArgs {
    /// Operator Onestop IDs (defaults to every registered operator)
    pub operators: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Show one registered feed or operator
    #[arg(value_name = "ONESTOP_ID")]
    pub onestop_id: Option<String>,

    /// Show configuration values and their sources
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Parser, Debug)]
pub struct StopsArgs {
    /// Origin identifier, e.g. gtfs://f-9qs-dta/s/BULLFROG
    #[arg(long, conflicts_with_all = ["lon", "lat"])]
    pub identifier: Option<String>,

    /// Longitude of the search center
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Latitude of the search center
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Search radius in meters
    #[arg(long, default_value = "1000")]
    pub radius: u32,

    /// Search the registry stop bins instead of the datastore
    #[arg(long, conflicts_with = "identifier")]
    pub local: bool,
}

#[derive(Parser, Debug)]
pub struct MergeArgs {
    /// GTFS zip archive or unpacked directory
    pub filename: PathBuf,

    /// Output zip archive
    pub outfile: PathBuf,

    /// Feed name
    #[arg(long)]
    pub name: String,

    /// Feed Onestop ID to use as the identifier namespace
    #[arg(long, value_name = "ONESTOP_ID")]
    pub feed_id: Option<String>,

    /// Overwrite an existing output file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// First GTFS zip archive or directory
    pub filename1: PathBuf,

    /// Second GTFS zip archive or directory
    pub filename2: PathBuf,

    /// Table to compare
    #[arg(long, default_value = "routes.txt")]
    pub table: String,

    /// Key column (repeatable, defaults to route_short_name); stops.txt also has `geohash`
    #[arg(long = "key", value_name = "COLUMN")]
    pub keys: Vec<String>,

    /// Swap the two datasets
    #[arg(long)]
    pub flip: bool,
}
