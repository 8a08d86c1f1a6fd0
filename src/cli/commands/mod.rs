pub mod operator;
pub mod server;
pub mod token;
