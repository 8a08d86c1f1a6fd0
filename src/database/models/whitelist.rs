use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UnknownVariant;

/// Whitelist decision state. `Pending` moves once to `Approve` or `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Pending,
    Approve,
    Deny,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Pending => "pending",
            Permission::Approve => "approve",
            Permission::Deny => "deny",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Permission::Pending)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Permission::Pending),
            "approve" => Ok(Permission::Approve),
            "deny" => Ok(Permission::Deny),
            other => Err(UnknownVariant::new("permission", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub id: i64,
    pub telegram_id: String,
    #[serde(rename = "from")]
    pub origin: String,
    pub text: String,
    pub chat_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub language_code: Option<String>,
    pub permission: Permission,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewWhitelistEntry {
    pub telegram_id: String,
    pub origin: String,
    pub text: String,
    pub chat_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub language_code: Option<String>,
}

/// Outcome of a whitelist submission.
#[derive(Debug, Clone)]
pub enum Submission {
    Created(WhitelistEntry),
    /// An entry for the same (telegram id, origin) already existed.
    Existing(WhitelistEntry),
}
