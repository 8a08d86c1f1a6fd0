// Token acquisition and whitelist intake; no bearer token required.
pub mod auth;
pub mod whitelist;

pub use auth::{consumer_token, operator_token};
pub use whitelist::submit_whitelist;
