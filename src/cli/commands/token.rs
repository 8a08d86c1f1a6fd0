use clap::Subcommand;
use serde_json::json;

use crate::auth::{Identity, TokenService};
use crate::cli::{utils::output_success, OutputFormat};
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Mint a user token")]
    User {
        #[arg(help = "Telegram id")]
        telegram_id: String,
    },

    #[command(about = "Mint an operator token")]
    Operator {
        #[arg(help = "Operator username")]
        username: String,
    },
}

pub fn handle(cmd: TokenCommands, config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let tokens = TokenService::from_config(&config.security)?;

    let identity = match cmd {
        TokenCommands::User { telegram_id } => Identity::user(telegram_id),
        TokenCommands::Operator { username } => Identity::operator(username),
    };
    let token = tokens.issue(&identity)?;

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            &format!("Token issued for {}", identity),
            Some(json!({ "access": token, "expires_in": tokens.lifetime().num_seconds() })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
