use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPERATOR_ROLE: &str = "operator";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Operator row to insert or update, keyed by username.
#[derive(Debug, Clone)]
pub struct NewOperator {
    pub username: String,
    pub password_hash: String,
    pub role: String,
}
