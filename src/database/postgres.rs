use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::models::{
    Endpoint, EndpointInput, Message, NewMessage, NewOperator, NewTicket, NewWhitelistEntry, Operator, Party,
    Permission, Submission, Ticket, User, WhitelistEntry,
};
use super::{Store, StoreError};
use crate::policy::TicketScope;

const USER_COLUMNS: &str = "id, telegram_id, uuid, created_at, updated_at, deleted_at";
const OPERATOR_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at, deleted_at";
const TICKET_COLUMNS: &str = "id, user_id, subject, description, source, status, short_id, \
     closed_by, closed_at, created_at, updated_at, deleted_at";
const MESSAGE_COLUMNS: &str = "id, ticket_id, sender, recipient, content, created_at, updated_at, deleted_at";
const WHITELIST_COLUMNS: &str = "id, telegram_id, origin, text, chat_id, first_name, last_name, username, \
     language_code, permission, created_at, updated_at, deleted_at";
const ENDPOINT_COLUMNS: &str = "id, name, url, created_at, updated_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = super::models::UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: super::models::UnknownVariant| StoreError::Corrupt(e.to_string()))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        telegram_id: row.try_get("telegram_id")?,
        uuid: row.try_get("uuid")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn operator_from_row(row: &PgRow) -> Result<Operator, StoreError> {
    Ok(Operator {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: row.try_get("role")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, StoreError> {
    let closed_by: Option<String> = row.try_get("closed_by")?;
    let closed_by = closed_by
        .map(|s| s.parse::<Party>())
        .transpose()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    Ok(Ticket {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        source: row.try_get("source")?,
        status: parse_column(row, "status")?,
        short_id: row.try_get("short_id")?,
        closed_by,
        closed_at: row.try_get("closed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, StoreError> {
    Ok(Message {
        id: row.try_get("id")?,
        ticket_id: row.try_get("ticket_id")?,
        sender: parse_column(row, "sender")?,
        recipient: parse_column(row, "recipient")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn whitelist_from_row(row: &PgRow) -> Result<WhitelistEntry, StoreError> {
    Ok(WhitelistEntry {
        id: row.try_get("id")?,
        telegram_id: row.try_get("telegram_id")?,
        origin: row.try_get("origin")?,
        text: row.try_get("text")?,
        chat_id: row.try_get("chat_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        username: row.try_get("username")?,
        language_code: row.try_get("language_code")?,
        permission: parse_column(row, "permission")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn endpoint_from_row(row: &PgRow) -> Result<Endpoint, StoreError> {
    Ok(Endpoint {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn endpoint_conflict(err: sqlx::Error, name: &str) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(format!("Endpoint '{}' already exists", name))
    } else {
        err.into()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_or_create_user(&self, telegram_id: &str) -> Result<User, StoreError> {
        if let Some(user) = self.find_user(telegram_id).await? {
            return Ok(user);
        }

        // A concurrent first login may insert the same id; the conflict is
        // absorbed and both callers read back the single row.
        let sql = "INSERT INTO users (telegram_id, uuid) VALUES ($1, $2) ON CONFLICT (telegram_id) DO NOTHING";
        sqlx::query(sql)
            .bind(telegram_id)
            .bind(Uuid::new_v4())
            .execute(&self.pool)
            .await?;

        self.find_user(telegram_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {}", telegram_id)))
    }

    async fn find_user(&self, telegram_id: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE telegram_id = $1", USER_COLUMNS);
        let row = sqlx::query(&sql).bind(telegram_id).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_operator(&self, username: &str) -> Result<Option<Operator>, StoreError> {
        let sql = format!("SELECT {} FROM operators WHERE username = $1", OPERATOR_COLUMNS);
        let row = sqlx::query(&sql).bind(username).fetch_optional(&self.pool).await?;
        row.as_ref().map(operator_from_row).transpose()
    }

    async fn upsert_operator(&self, operator: NewOperator) -> Result<Operator, StoreError> {
        let sql = format!(
            "INSERT INTO operators (username, password_hash, role) VALUES ($1, $2, $3) \
             ON CONFLICT (username) DO UPDATE \
             SET password_hash = EXCLUDED.password_hash, role = EXCLUDED.role, updated_at = now() \
             RETURNING {}",
            OPERATOR_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&operator.username)
            .bind(&operator.password_hash)
            .bind(&operator.role)
            .fetch_one(&self.pool)
            .await?;
        operator_from_row(&row)
    }

    async fn create_ticket(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let sql = format!(
            "INSERT INTO tickets (user_id, subject, description, source, status, short_id) \
             VALUES ($1, $2, $3, $4, 'OPEN', $5) RETURNING {}",
            TICKET_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(ticket.user_id)
            .bind(&ticket.subject)
            .bind(&ticket.description)
            .bind(&ticket.source)
            .bind(Uuid::new_v4())
            .fetch_one(&self.pool)
            .await?;
        ticket_from_row(&row)
    }

    async fn get_ticket(&self, id: i64) -> Result<Option<Ticket>, StoreError> {
        let sql = format!("SELECT {} FROM tickets WHERE id = $1", TICKET_COLUMNS);
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn list_tickets(&self, scope: TicketScope) -> Result<Vec<Ticket>, StoreError> {
        let rows = match scope {
            TicketScope::All => {
                let sql = format!("SELECT {} FROM tickets ORDER BY id", TICKET_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
            TicketScope::OwnedBy(user_id) => {
                let sql = format!("SELECT {} FROM tickets WHERE user_id = $1 ORDER BY id", TICKET_COLUMNS);
                sqlx::query(&sql).bind(user_id).fetch_all(&self.pool).await?
            }
        };
        rows.iter().map(ticket_from_row).collect()
    }

    async fn close_ticket(&self, id: i64, closed_by: Party) -> Result<Option<Ticket>, StoreError> {
        let sql = format!(
            "UPDATE tickets SET status = 'CLOSED', closed_by = $2, closed_at = now(), updated_at = now() \
             WHERE id = $1 AND status = 'OPEN' RETURNING {}",
            TICKET_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(closed_by.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, StoreError> {
        let sql = format!(
            "INSERT INTO messages (ticket_id, sender, recipient, content) VALUES ($1, $2, $3, $4) RETURNING {}",
            MESSAGE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(message.ticket_id)
            .bind(message.sender.as_str())
            .bind(message.recipient.as_str())
            .bind(&message.content)
            .fetch_one(&self.pool)
            .await?;
        message_from_row(&row)
    }

    async fn list_messages(&self, ticket_id: i64) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "SELECT {} FROM messages WHERE ticket_id = $1 ORDER BY created_at ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(ticket_id).fetch_all(&self.pool).await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn submit_whitelist(&self, entry: NewWhitelistEntry) -> Result<Submission, StoreError> {
        let sql = format!(
            "INSERT INTO whitelist_entries \
             (telegram_id, origin, text, chat_id, first_name, last_name, username, language_code, permission) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending') \
             ON CONFLICT (telegram_id, origin) DO NOTHING RETURNING {}",
            WHITELIST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&entry.telegram_id)
            .bind(&entry.origin)
            .bind(&entry.text)
            .bind(entry.chat_id)
            .bind(&entry.first_name)
            .bind(&entry.last_name)
            .bind(&entry.username)
            .bind(&entry.language_code)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            return Ok(Submission::Created(whitelist_from_row(&row)?));
        }

        let existing = self
            .find_whitelist(&entry.telegram_id, Some(&entry.origin))
            .await?
            .ok_or_else(|| {
                StoreError::NotFound(format!("whitelist entry {}/{}", entry.telegram_id, entry.origin))
            })?;
        Ok(Submission::Existing(existing))
    }

    async fn find_whitelist(
        &self,
        telegram_id: &str,
        origin: Option<&str>,
    ) -> Result<Option<WhitelistEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM whitelist_entries WHERE telegram_id = $1 AND ($2::text IS NULL OR origin = $2) \
             ORDER BY created_at ASC, id ASC LIMIT 1",
            WHITELIST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(telegram_id)
            .bind(origin)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(whitelist_from_row).transpose()
    }

    async fn list_whitelist(&self, permission: Option<Permission>) -> Result<Vec<WhitelistEntry>, StoreError> {
        let sql = format!(
            "SELECT {} FROM whitelist_entries WHERE ($1::text IS NULL OR permission = $1) \
             ORDER BY created_at ASC, id ASC",
            WHITELIST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(permission.map(|p| p.as_str()))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(whitelist_from_row).collect()
    }

    async fn decide_whitelist(
        &self,
        id: i64,
        permission: Permission,
    ) -> Result<Option<WhitelistEntry>, StoreError> {
        let sql = format!(
            "UPDATE whitelist_entries SET permission = $2, updated_at = now() \
             WHERE id = $1 AND permission = 'pending' RETURNING {}",
            WHITELIST_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(permission.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(whitelist_from_row).transpose()
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, StoreError> {
        let sql = format!("SELECT {} FROM endpoints ORDER BY id", ENDPOINT_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(endpoint_from_row).collect()
    }

    async fn create_endpoint(&self, endpoint: EndpointInput) -> Result<Endpoint, StoreError> {
        let sql = format!(
            "INSERT INTO endpoints (name, url) VALUES ($1, $2) RETURNING {}",
            ENDPOINT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&endpoint.name)
            .bind(&endpoint.url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| endpoint_conflict(e, &endpoint.name))?;
        endpoint_from_row(&row)
    }

    async fn update_endpoint(&self, id: i64, endpoint: EndpointInput) -> Result<Option<Endpoint>, StoreError> {
        let sql = format!(
            "UPDATE endpoints SET name = $2, url = $3, updated_at = now() WHERE id = $1 RETURNING {}",
            ENDPOINT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(&endpoint.name)
            .bind(&endpoint.url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| endpoint_conflict(e, &endpoint.name))?;
        row.as_ref().map(endpoint_from_row).transpose()
    }

    async fn delete_endpoint(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM endpoints WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
