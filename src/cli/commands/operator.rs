use clap::Subcommand;
use serde_json::json;
use std::io::BufRead;

use crate::auth::password::hash_password;
use crate::cli::{utils::output_success, OutputFormat};
use crate::config::{AppConfig, StoreBackend};
use crate::database::models::{NewOperator, DEFAULT_OPERATOR_ROLE};
use crate::database::open_store;

#[derive(Subcommand)]
pub enum OperatorCommands {
    #[command(about = "Create an operator or reset an existing one")]
    Add {
        #[arg(help = "Operator username")]
        username: String,
        #[arg(long, help = "Password (read from stdin when omitted)")]
        password: Option<String>,
        #[arg(long, default_value = DEFAULT_OPERATOR_ROLE, help = "Stored role")]
        role: String,
    },
}

fn read_password() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}

pub async fn handle(cmd: OperatorCommands, config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        OperatorCommands::Add { username, password, role } => {
            if config.database.store == StoreBackend::Memory {
                tracing::warn!("Memory store selected; the operator is lost when this command exits");
            }

            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };

            let store = open_store(&config.database).await?;
            let operator = store
                .upsert_operator(NewOperator {
                    username,
                    password_hash: hash_password(&password)?,
                    role,
                })
                .await?;

            output_success(
                output_format,
                &format!("Operator '{}' saved", operator.username),
                Some(json!({ "id": operator.id, "username": operator.username, "role": operator.role })),
            )
        }
    }
}
