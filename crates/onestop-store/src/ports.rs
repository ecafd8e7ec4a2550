use onestop_core::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default search radius for stop lookups, in meters
pub const DEFAULT_SEARCH_RADIUS: u32 = 1000;

/// Stop lookup against a datastore
#[derive(Debug, Clone, PartialEq)]
pub enum StopQuery {
    /// Stops carrying an origin identifier
    Identifier(String),
    /// Stops within `radius` meters of a point
    Near { lon: f64, lat: f64, radius: u32 },
}

impl StopQuery {
    pub fn near(lon: f64, lat: f64) -> Self {
        StopQuery::Near { lon, lat, radius: DEFAULT_SEARCH_RADIUS }
    }

    /// Query parameters for the stops endpoint, unencoded
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            StopQuery::Identifier(identifier) => vec![("identifier", identifier.clone())],
            StopQuery::Near { lon, lat, radius } => vec![
                ("lon", format!("{:.8}", lon)),
                ("lat", format!("{:.8}", lat)),
                ("r", radius.to_string()),
            ],
        }
    }
}

/// Top-level changeset request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesetRequest {
    pub changeset: Changeset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changeset {
    pub when_to_apply: String,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub action: String,
    #[serde(flatten)]
    pub target: ChangeTarget,
}

/// Entity payload keyed by its datastore type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTarget {
    Operator(Value),
    Route(Value),
    Stop(Value),
}

impl ChangeTarget {
    pub fn data(&self) -> &Value {
        match self {
            ChangeTarget::Operator(data) | ChangeTarget::Route(data) | ChangeTarget::Stop(data) => data,
        }
    }
}

/// Port for a remote transit datastore
pub trait Datastore {
    /// Submit a changeset
    fn post_changeset(&self, request: &ChangesetRequest) -> Result<()>;

    /// Find stops; each stop is returned as its JSON record
    fn stops(&self, query: &StopQuery) -> Result<Vec<Value>>;
}
