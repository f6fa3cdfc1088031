mod commands;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use passline_api::ErrorClass;
use passline_auth::KeyMaterialProvider;
use passline_core::{default_config_dir, load_config_from_dir, write_default_config_files};
use passline_runtime::{PasslineRuntime, Rejection};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::account::{self, AccountCommands};
use crate::commands::token::{self, TokenCommands};

#[derive(Debug, Parser)]
#[command(name = "passline", about = "Passline: signed identity tokens and account lookup")]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a default passline.toml into the config directory
    Init,
    /// Show the loaded key identifiers
    Keys,
    /// Issue, publish and verify tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// Resolve bearer credentials to accounts
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "passline=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir, cli.json),
        Commands::Keys => cmd_keys(&load_runtime(&cfg_dir)?, cli.json),
        Commands::Token { command } => {
            token::cmd_token(&load_runtime(&cfg_dir)?, command, cli.json)
        }
        Commands::Account { command } => {
            account::cmd_account(&load_runtime(&cfg_dir)?, command, cli.json)
        }
    }
}

fn cmd_init(cfg_dir: &Path, json: bool) -> anyhow::Result<()> {
    let written = write_default_config_files(cfg_dir)?;
    let text = if written {
        "Init complete. Generate the key pair referenced in passline.toml before issuing."
    } else {
        "passline.toml already exists, left untouched"
    };
    pout(
        json,
        serde_json::json!({"message": text, "config_dir": cfg_dir, "written": written}),
        text,
    )
}

/// Key failures are fatal: logged, then the process exits with status 1.
fn load_runtime(cfg_dir: &Path) -> anyhow::Result<PasslineRuntime> {
    let config = load_config_from_dir(cfg_dir).map_err(|e| {
        anyhow::anyhow!("{e}\nRun `passline init --config-dir {}` first.", cfg_dir.display())
    })?;
    match PasslineRuntime::from_config(config) {
        Ok(runtime) => Ok(runtime),
        Err(e) => {
            tracing::error!(kind = e.kind(), "key material failed to load: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_keys(runtime: &PasslineRuntime, json: bool) -> anyhow::Result<()> {
    let keys = runtime.keys();
    let active = keys.issuance_key()?.kid;
    let entries: Vec<_> = keys
        .entries()
        .map(|e| {
            serde_json::json!({
                "kid": e.kid(),
                "can_sign": e.can_sign(),
                "active": e.kid() == active,
            })
        })
        .collect();
    let text = keys
        .kids()
        .map(|kid| if kid == active { format!("{kid} (active)") } else { kid.to_string() })
        .collect::<Vec<_>>()
        .join("\n");
    pout(json, serde_json::Value::Array(entries), &text)
}

pub fn pout(json_mode: bool, value: serde_json::Value, text: &str) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{text}");
    }
    Ok(())
}

/// Print a rejection envelope and exit with a code per failure class.
pub fn exit_rejected(json_mode: bool, rejection: &Rejection) -> anyhow::Result<()> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&rejection.body)?);
    } else {
        eprintln!(
            "{}: {}",
            rejection.body.exception_type.as_deref().unwrap_or("Error"),
            rejection.body.message.as_deref().unwrap_or_default()
        );
    }
    let code = match rejection.class {
        ErrorClass::Fatal => 1,
        ErrorClass::Client => 2,
        ErrorClass::Authorization => 3,
    };
    std::process::exit(code);
}
