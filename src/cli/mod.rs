pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(about = "Helpdesk CLI - run the API server and manage operators and tokens")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve,

    #[command(about = "Apply database migrations")]
    Migrate,

    #[command(about = "Operator account management")]
    Operator {
        #[command(subcommand)]
        cmd: commands::operator::OperatorCommands,
    },

    #[command(about = "Mint bearer tokens with the configured secret")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = crate::config::config().clone();

    match cli.command {
        Commands::Serve => commands::server::serve(config).await,
        Commands::Migrate => commands::server::migrate(config, output_format).await,
        Commands::Operator { cmd } => commands::operator::handle(cmd, config, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, config, output_format),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_operator_add() {
        let cli = Cli::try_parse_from(["helpdesk", "--json", "operator", "add", "alice", "--password", "pw"]).unwrap();
        assert!(matches!(OutputFormat::from_cli(&cli), OutputFormat::Json));
        match cli.command {
            Commands::Operator {
                cmd: commands::operator::OperatorCommands::Add { username, password, role },
            } => {
                assert_eq!(username, "alice");
                assert_eq!(password.as_deref(), Some("pw"));
                assert_eq!(role, "operator");
            }
            _ => panic!("expected operator add"),
        }
    }

    #[test]
    fn parses_token_user() {
        let cli = Cli::try_parse_from(["helpdesk", "token", "user", "123"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Token {
                cmd: commands::token::TokenCommands::User { .. }
            }
        ));
    }
}
