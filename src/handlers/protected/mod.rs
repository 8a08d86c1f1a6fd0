// Handlers behind jwt_auth_middleware; the caller's Identity is in the request extensions.
pub mod messages;
pub mod session;
pub mod tickets;

pub use messages::{create_message, list_messages};
pub use session::logout;
pub use tickets::{close_ticket, create_ticket, list_tickets};

use crate::auth::Identity;
use crate::database::Store;
use crate::error::ApiError;
use crate::policy::Caller;

/// Binds a token identity to its stored record.
pub(crate) async fn resolve_caller(store: &dyn Store, identity: &Identity) -> Result<Caller, ApiError> {
    match identity {
        Identity::User { telegram_id } => {
            let user = store
                .find_user(telegram_id)
                .await?
                .ok_or_else(|| ApiError::unauthorized("User not found"))?;
            Ok(Caller::User {
                id: user.id,
                telegram_id: user.telegram_id,
            })
        }
        Identity::Operator { username } => Ok(Caller::Operator {
            username: username.clone(),
        }),
    }
}
