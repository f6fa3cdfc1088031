use clap::Subcommand;
use passline_runtime::PasslineRuntime;

use crate::{exit_rejected, pout};

#[derive(Debug, Subcommand)]
pub enum AccountCommands {
    /// Resolve an Authorization header value to an account
    Resolve {
        /// Full header value, e.g. "Bearer eyJ..."
        #[arg(long)]
        authorization: Option<String>,
    },
    /// List directory entries
    List,
}

pub fn cmd_account(
    runtime: &PasslineRuntime,
    command: AccountCommands,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        AccountCommands::Resolve { authorization } => {
            match runtime.account_response(authorization.as_deref()) {
                Ok(response) => {
                    let text = match &response.account {
                        Some(a) => format!("{} {} ({})", a.first_name, a.last_name, a.user_name),
                        None => response.message.clone(),
                    };
                    pout(json, serde_json::to_value(&response)?, &text)
                }
                Err(rejection) => exit_rejected(json, &rejection),
            }
        }
        AccountCommands::List => {
            let accounts: Vec<_> = runtime.accounts().iter().collect();
            let text = accounts
                .iter()
                .map(|a| format!("{}\t{} {}", a.user_name, a.first_name, a.last_name))
                .collect::<Vec<_>>()
                .join("\n");
            pout(json, serde_json::to_value(accounts)?, &text)
        }
    }
}
