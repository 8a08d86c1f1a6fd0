use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Callback URL for an origin system, keyed by the origin tag in `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
}
