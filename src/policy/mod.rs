//! Access decisions for tickets, messages and operator-only resources.
//!
//! Everything here is pure. Handlers run the checks in a fixed order: request
//! shape and role first (no store access), then the target lookup, then
//! ownership, then state.

use thiserror::Error;

use crate::auth::Identity;
use crate::database::models::{Party, Ticket};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Ticket already closed")]
    AlreadyClosed,
}

/// A token identity resolved against the credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    User { id: i64, telegram_id: String },
    Operator { username: String },
}

impl Caller {
    pub fn party(&self) -> Party {
        match self {
            Caller::User { .. } => Party::User,
            Caller::Operator { .. } => Party::Operator,
        }
    }

    fn owns(&self, ticket: &Ticket) -> bool {
        matches!(self, Caller::User { id, .. } if *id == ticket.user_id)
    }
}

/// Which tickets a caller may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    OwnedBy(i64),
}

/// Operation on an existing ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketAction {
    PostMessage { sender: Party },
    ReadHistory,
    Close,
}

pub fn require_operator(identity: &Identity) -> Result<&str, PolicyError> {
    match identity {
        Identity::Operator { username } => Ok(username),
        Identity::User { .. } => Err(PolicyError::Forbidden("Forbidden: Operator access required")),
    }
}

/// Internal id of the user a new ticket belongs to. Operators own nothing.
pub fn ticket_owner(caller: &Caller) -> Result<i64, PolicyError> {
    match caller {
        Caller::User { id, .. } => Ok(*id),
        Caller::Operator { .. } => Err(PolicyError::Forbidden("Only users can create tickets")),
    }
}

pub fn ticket_scope(caller: &Caller) -> TicketScope {
    match caller {
        Caller::Operator { .. } => TicketScope::All,
        Caller::User { id, .. } => TicketScope::OwnedBy(*id),
    }
}

/// Parses sender and recipient; both must name a conversation party.
pub fn message_parties(sender: &str, recipient: &str) -> Result<(Party, Party), PolicyError> {
    match (sender.parse::<Party>(), recipient.parse::<Party>()) {
        (Ok(s), Ok(r)) => Ok((s, r)),
        _ => Err(PolicyError::InvalidRequest(
            "Sender and Recipient must be 'user' or 'operator'".to_string(),
        )),
    }
}

/// Role check on the sender, decidable before the ticket is loaded.
pub fn check_sender(identity: &Identity, sender: Party) -> Result<(), PolicyError> {
    match (identity, sender) {
        (Identity::Operator { .. }, Party::Operator) => Ok(()),
        (Identity::Operator { .. }, Party::User) => {
            Err(PolicyError::Forbidden("Operators can only send as 'operator'"))
        }
        (Identity::User { .. }, Party::Operator) => {
            Err(PolicyError::Forbidden("Only operators can send as 'operator'"))
        }
        (Identity::User { .. }, Party::User) => Ok(()),
    }
}

/// Ownership and state rules for an action on a loaded ticket.
pub fn authorize_ticket(caller: &Caller, ticket: &Ticket, action: TicketAction) -> Result<(), PolicyError> {
    if let Caller::User { .. } = caller {
        if !caller.owns(ticket) {
            return Err(match action {
                TicketAction::PostMessage { .. } => {
                    PolicyError::Forbidden("Only the ticket owner can send as 'user'")
                }
                TicketAction::ReadHistory => PolicyError::Forbidden("You can only view your own tickets"),
                TicketAction::Close => PolicyError::Forbidden("You can only close your own tickets"),
            });
        }
    }

    match action {
        TicketAction::PostMessage { sender } if sender != caller.party() => {
            Err(PolicyError::Forbidden("Sender must match the caller's role"))
        }
        TicketAction::Close if ticket.is_closed() => Err(PolicyError::AlreadyClosed),
        _ => Ok(()),
    }
}
