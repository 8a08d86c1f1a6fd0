use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use super::models::{
    Endpoint, EndpointInput, Message, NewMessage, NewOperator, NewTicket, NewWhitelistEntry, Operator, Party,
    Permission, Submission, Ticket, TicketStatus, User, WhitelistEntry,
};
use super::{Store, StoreError};
use crate::policy::TicketScope;

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    operators: Vec<Operator>,
    tickets: Vec<Ticket>,
    messages: Vec<Message>,
    whitelist: Vec<WhitelistEntry>,
    endpoints: Vec<Endpoint>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store with the same semantics as [`super::PgStore`].
///
/// Used for tests and for `HELPDESK_STORE=memory`. Every operation runs
/// under one lock, so conditional updates are trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_or_create_user(&self, telegram_id: &str) -> Result<User, StoreError> {
        let mut tables = self.tables.lock();
        if let Some(user) = tables.users.iter().find(|u| u.telegram_id == telegram_id) {
            return Ok(user.clone());
        }

        let now = Utc::now();
        let user = User {
            id: tables.next_id(),
            telegram_id: telegram_id.to_string(),
            uuid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, telegram_id: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.users.iter().find(|u| u.telegram_id == telegram_id).cloned())
    }

    async fn find_operator(&self, username: &str) -> Result<Option<Operator>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.operators.iter().find(|o| o.username == username).cloned())
    }

    async fn upsert_operator(&self, operator: NewOperator) -> Result<Operator, StoreError> {
        let mut tables = self.tables.lock();
        let now = Utc::now();

        if let Some(existing) = tables.operators.iter_mut().find(|o| o.username == operator.username) {
            existing.password_hash = operator.password_hash;
            existing.role = operator.role;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let created = Operator {
            id: tables.next_id(),
            username: operator.username,
            password_hash: operator.password_hash,
            role: operator.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.operators.push(created.clone());
        Ok(created)
    }

    async fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let mut tables = self.tables.lock();
        let now = Utc::now();
        let created = Ticket {
            id: tables.next_id(),
            user_id: ticket.user_id,
            subject: ticket.subject,
            description: ticket.description,
            source: ticket.source,
            status: TicketStatus::Open,
            short_id: Uuid::new_v4(),
            closed_by: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.tickets.push(created.clone());
        Ok(created)
    }

    async fn get_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.tickets.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .tickets
            .iter()
            .filter(|t| match scope {
                TicketScope::All => true,
                TicketScope::OwnedBy(user_id) => t.user_id == user_id,
            })
            .cloned()
            .collect())
    }

    async fn close_ticket(&self, id: i64, closed_by: Party) -> Result<Option<Ticket>, StoreError> {
        let mut tables = self.tables.lock();
        let Some(ticket) = tables
            .tickets
            .iter_mut()
            .find(|t| t.id == id && t.status == TicketStatus::Open)
        else {
            return Ok(None);
        };

        let now = Utc::now();
        ticket.status = TicketStatus::Closed;
        ticket.closed_by = Some(closed_by);
        ticket.closed_at = Some(now);
        ticket.updated_at = now;
        Ok(Some(ticket.clone()))
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let mut tables = self.tables.lock();
        if !tables.tickets.iter().any(|t| t.id == message.ticket_id) {
            return Err(StoreError::NotFound(format!("ticket {}", message.ticket_id)));
        }

        let now = Utc::now();
        let created = Message {
            id: tables.next_id(),
            ticket_id: message.ticket_id,
            sender: message.sender,
            recipient: message.recipient,
            content: message.content,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.messages.push(created.clone());
        Ok(created)
    }

    async fn list_messages(&self, ticket_id: i64) -> Result<Vec<Message>, StoreError> {
        let tables = self.tables.lock();
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn submit_whitelist(&self, entry: NewWhitelistEntry) -> Result<Submission, StoreError> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables
            .whitelist
            .iter()
            .find(|w| w.telegram_id == entry.telegram_id && w.origin == entry.origin)
        {
            return Ok(Submission::Existing(existing.clone()));
        }

        let now = Utc::now();
        let created = WhitelistEntry {
            id: tables.next_id(),
            telegram_id: entry.telegram_id,
            origin: entry.origin,
            text: entry.text,
            chat_id: entry.chat_id,
            first_name: entry.first_name,
            last_name: entry.last_name,
            username: entry.username,
            language_code: entry.language_code,
            permission: Permission::Pending,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.whitelist.push(created.clone());
        Ok(Submission::Created(created))
    }

    async fn find_whitelist(
        &self,
        telegram_id: &str,
        origin: Option<&str>,
    ) -> Result<Option<WhitelistEntry>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .whitelist
            .iter()
            .find(|w| w.telegram_id == telegram_id && origin.map_or(true, |o| w.origin == o))
            .cloned())
    }

    async fn list_whitelist(&self, permission: Option<Permission>) -> Result<Vec<WhitelistEntry>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .whitelist
            .iter()
            .filter(|w| permission.map_or(true, |p| w.permission == p))
            .cloned()
            .collect())
    }

    async fn decide_whitelist(
        &self,
        id: i64,
        permission: Permission,
    ) -> Result<Option<WhitelistEntry>, StoreError> {
        let mut tables = self.tables.lock();
        let Some(entry) = tables
            .whitelist
            .iter_mut()
            .find(|w| w.id == id && w.permission == Permission::Pending)
        else {
            return Ok(None);
        };

        entry.permission = permission;
        entry.updated_at = Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, StoreError> {
        Ok(self.tables.lock().endpoints.clone())
    }

    async fn create_endpoint(&self, endpoint: EndpointInput) -> Result<Endpoint, StoreError> {
        let mut tables = self.tables.lock();
        if tables.endpoints.iter().any(|e| e.name == endpoint.name) {
            return Err(StoreError::Conflict(format!("Endpoint '{}' already exists", endpoint.name)));
        }

        let now = Utc::now();
        let created = Endpoint {
            id: tables.next_id(),
            name: endpoint.name,
            url: endpoint.url,
            created_at: now,
            updated_at: now,
        };
        tables.endpoints.push(created.clone());
        Ok(created)
    }

    async fn update_endpoint(&self, id: i64, endpoint: EndpointInput) -> Result<Option<Endpoint>, StoreError> {
        let mut tables = self.tables.lock();
        if tables.endpoints.iter().any(|e| e.id != id && e.name == endpoint.name) {
            return Err(StoreError::Conflict(format!("Endpoint '{}' already exists", endpoint.name)));
        }

        let Some(existing) = tables.endpoints.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        existing.name = endpoint.name;
        existing.url = endpoint.url;
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete_endpoint(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        let before = tables.endpoints.len();
        tables.endpoints.retain(|e| e.id != id);
        Ok(tables.endpoints.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(telegram_id: &str, origin: &str) -> NewWhitelistEntry {
        NewWhitelistEntry {
            telegram_id: telegram_id.into(),
            origin: origin.into(),
            text: "please".into(),
            chat_id: 42,
            first_name: "Ann".into(),
            last_name: "Lee".into(),
            username: "ann".into(),
            language_code: None,
        }
    }

    #[tokio::test]
    async fn find_or_create_user_is_idempotent() {
        let store = MemoryStore::new();
        let a = store.find_or_create_user("100").await.unwrap();
        let b = store.find_or_create_user("100").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.uuid, b.uuid);
    }

    #[tokio::test]
    async fn close_is_conditional_on_open() {
        let store = MemoryStore::new();
        let user = store.find_or_create_user("1").await.unwrap();
        let ticket = store
            .create_ticket(NewTicket {
                user_id: user.id,
                subject: "s".into(),
                description: "d".into(),
                source: "telegram".into(),
            })
            .await
            .unwrap();

        let closed = store.close_ticket(ticket.id, Party::User).await.unwrap().unwrap();
        assert_eq!(closed.status, TicketStatus::Closed);
        assert_eq!(closed.closed_by, Some(Party::User));
        assert!(closed.closed_at.is_some());

        assert!(store.close_ticket(ticket.id, Party::Operator).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scoped_listing() {
        let store = MemoryStore::new();
        for owner in [1, 1, 2] {
            store
                .create_ticket(NewTicket {
                    user_id: owner,
                    subject: "s".into(),
                    description: "d".into(),
                    source: "telegram".into(),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.list_tickets(TicketScope::All).await.unwrap().len(), 3);
        assert_eq!(store.list_tickets(TicketScope::OwnedBy(1)).await.unwrap().len(), 2);
        assert!(store.list_tickets(TicketScope::OwnedBy(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_submission_returns_existing() {
        let store = MemoryStore::new();
        let first = match store.submit_whitelist(submission("7", "dev")).await.unwrap() {
            Submission::Created(entry) => entry,
            other => panic!("expected creation, got {:?}", other),
        };
        match store.submit_whitelist(submission("7", "dev")).await.unwrap() {
            Submission::Existing(entry) => assert_eq!(entry.id, first.id),
            other => panic!("expected existing, got {:?}", other),
        }
        assert!(matches!(
            store.submit_whitelist(submission("7", "prom")).await.unwrap(),
            Submission::Created(_)
        ));
    }

    #[tokio::test]
    async fn decision_is_final() {
        let store = MemoryStore::new();
        let Submission::Created(entry) = store.submit_whitelist(submission("7", "dev")).await.unwrap() else {
            panic!("expected creation");
        };
        let decided = store.decide_whitelist(entry.id, Permission::Deny).await.unwrap().unwrap();
        assert_eq!(decided.permission, Permission::Deny);
        assert!(store.decide_whitelist(entry.id, Permission::Approve).await.unwrap().is_none());

        let pending = store.list_whitelist(Some(Permission::Pending)).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn endpoint_names_are_unique() {
        let store = MemoryStore::new();
        let input = |name: &str| EndpointInput {
            name: name.into(),
            url: "http://localhost/cb".into(),
        };
        let dev = store.create_endpoint(input("dev")).await.unwrap();
        let prom = store.create_endpoint(input("prom")).await.unwrap();
        assert!(matches!(store.create_endpoint(input("dev")).await, Err(StoreError::Conflict(_))));
        assert!(matches!(
            store.update_endpoint(prom.id, input("dev")).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(store.update_endpoint(dev.id, input("dev")).await.unwrap().is_some());
        assert!(store.delete_endpoint(dev.id).await.unwrap());
        assert!(!store.delete_endpoint(dev.id).await.unwrap());
    }
}
