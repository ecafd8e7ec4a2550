use onestop_core::formats::KeyDiff;
use onestop_graph::MergeSummary;
use serde::Serialize;
use tabled::Tabled;

/// Output for init command
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub registry_path: String,
    pub directories: Vec<String>,
}

/// Counts of one built feed, as written to the registry
#[derive(Debug, Serialize)]
pub struct FeedOutput {
    pub onestop_id: String,
    pub name: String,
    pub sha1: Option<String>,
    pub operators: Vec<OperatorSummary>,
    pub routes: usize,
    pub stops: usize,
    pub stop_bins: usize,
    pub files: Vec<String>,
}

#[derive(Debug, Serialize, Tabled)]
pub struct OperatorSummary {
    #[tabled(rename = "Operator")]
    pub onestop_id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Routes")]
    pub routes: usize,
    #[tabled(rename = "Stops")]
    pub stops: usize,
}

/// Output for fetch command
#[derive(Debug, Serialize, Tabled)]
pub struct FetchOutput {
    #[tabled(rename = "Feed")]
    pub feed: String,
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "SHA-1")]
    pub sha1: String,
    #[tabled(rename = "Cached")]
    pub cached: bool,
}

/// Output for publish command
#[derive(Debug, Serialize, Tabled)]
pub struct PublishOutput {
    #[tabled(rename = "Operator")]
    pub operator: String,
    #[tabled(rename = "Changesets")]
    pub changesets: usize,
}

/// Output for info command
#[derive(Debug, Serialize)]
pub struct InfoOutput {
    pub registry_path: String,
    pub feeds: Vec<FeedRow>,
    pub operators: Vec<String>,
    pub stop_bins: Vec<String>,
}

#[derive(Debug, Serialize, Tabled)]
pub struct FeedRow {
    #[tabled(rename = "Feed")]
    pub onestop_id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "URL")]
    pub url: String,
    #[tabled(rename = "Operators")]
    pub operators: usize,
}

#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

#[derive(Debug, Serialize, Tabled)]
pub struct StopRow {
    #[tabled(rename = "Stop")]
    pub onestop_id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Served by")]
    pub served_by: String,
}

/// Output for merge command
#[derive(Debug, Serialize)]
pub struct MergeOutput {
    pub feed: String,
    pub output: String,
    #[serde(flatten)]
    pub summary: MergeSummary,
}

/// Output for diff command
#[derive(Debug, Serialize)]
pub struct DiffOutput {
    pub table: String,
    pub keys: Vec<String>,
    #[serde(flatten)]
    pub diff: KeyDiff,
}
