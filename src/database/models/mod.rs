pub mod endpoint;
pub mod message;
pub mod operator;
pub mod ticket;
pub mod user;
pub mod whitelist;

pub use endpoint::{Endpoint, EndpointInput};
pub use message::{Message, NewMessage, Party};
pub use operator::{NewOperator, Operator, DEFAULT_OPERATOR_ROLE};
pub use ticket::{NewTicket, Ticket, TicketStatus};
pub use user::User;
pub use whitelist::{NewWhitelistEntry, Permission, Submission, WhitelistEntry};

/// Error returned when a stored or submitted enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
