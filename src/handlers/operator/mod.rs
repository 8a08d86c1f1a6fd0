// Handlers behind require_operator_middleware.
pub mod settings;
pub mod tickets;
pub mod whitelist;

pub use settings::{create_endpoint, delete_endpoint, list_endpoints, update_endpoint};
pub use tickets::close_ticket;
pub use whitelist::{edit_whitelist, list_all_whitelist, list_pending_whitelist};
