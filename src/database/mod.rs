pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::policy::TicketScope;
use models::{
    Endpoint, EndpointInput, Message, NewMessage, NewOperator, NewTicket, NewWhitelistEntry, Operator, Party,
    Permission, Submission, Ticket, User, WhitelistEntry,
};

pub use manager::open_store;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Relational operations the handlers depend on.
///
/// Conditional writes (`close_ticket`, `decide_whitelist`) return `None`
/// when the row exists but is no longer in the expected state; callers load
/// the row first to tell that apart from absence.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // Credentials
    async fn find_or_create_user(&self, telegram_id: &str) -> Result<User, StoreError>;
    async fn find_user(&self, telegram_id: &str) -> Result<Option<User>, StoreError>;
    async fn find_operator(&self, username: &str) -> Result<Option<Operator>, StoreError>;
    async fn upsert_operator(&self, operator: NewOperator) -> Result<Operator, StoreError>;

    // Tickets and messages
    async fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError>;
    async fn get_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError>;
    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, StoreError>;
    async fn close_ticket(&self, id: i64, closed_by: Party) -> Result<Option<Ticket>, StoreError>;
    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError>;
    async fn list_messages(&self, ticket_id: i64) -> Result<Vec<Message>, StoreError>;

    // Whitelist
    async fn submit_whitelist(&self, entry: NewWhitelistEntry) -> Result<Submission, StoreError>;
    async fn find_whitelist(
        &self,
        telegram_id: &str,
        origin: Option<&str>,
    ) -> Result<Option<WhitelistEntry>, StoreError>;
    async fn list_whitelist(&self, permission: Option<Permission>) -> Result<Vec<WhitelistEntry>, StoreError>;
    async fn decide_whitelist(
        &self,
        id: i64,
        permission: Permission,
    ) -> Result<Option<WhitelistEntry>, StoreError>;

    // Endpoint settings
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, StoreError>;
    async fn create_endpoint(&self, endpoint: EndpointInput) -> Result<Endpoint, StoreError>;
    async fn update_endpoint(&self, id: i64, endpoint: EndpointInput) -> Result<Option<Endpoint>, StoreError>;
    async fn delete_endpoint(&self, id: i64) -> Result<bool, StoreError>;
}
