use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use passline_api::{Account, KeyId, PublisherConfig, PublisherKind};
use passline_auth::{DEFAULT_TTL, KeyEntry, KeySet};
use serde::Deserialize;

use crate::{AccountDirectory, demo_directory};

pub const CONFIG_FILE: &str = "passline.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct KeyFileConfig {
    pub kid: KeyId,
    pub private_key: Option<PathBuf>,
    pub public_key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct KeyConfig {
    pub active: KeyId,
    pub entries: Vec<KeyFileConfig>,
}

impl KeyConfig {
    /// Read every configured PEM file. Any failure is [`passline_auth::Error::KeyUnavailable`].
    pub fn load(&self) -> passline_auth::Result<KeySet> {
        let entries = self
            .entries
            .iter()
            .map(|e| {
                KeyEntry::from_rsa_pem_files(e.kid.clone(), e.private_key.as_deref(), &e.public_key)
            })
            .collect::<passline_auth::Result<Vec<_>>>()?;
        KeySet::new(self.active.clone(), entries)
    }
}

#[derive(Debug, Clone)]
pub struct PasslineConfig {
    pub token_ttl: Duration,
    pub keys: KeyConfig,
    pub accounts: AccountDirectory,
    pub publisher: PublisherConfig,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    tokens: RawTokens,
    keys: RawKeys,
    #[serde(default)]
    publisher: PublisherConfig,
    accounts: Option<BTreeMap<String, RawAccount>>,
}

#[derive(Debug, Deserialize)]
struct RawTokens {
    #[serde(default = "default_ttl_seconds")]
    ttl_seconds: u64,
}

impl Default for RawTokens {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL.as_secs()
}

#[derive(Debug, Deserialize)]
struct RawKeys {
    active: String,
    #[serde(default)]
    entries: Vec<RawKeyEntry>,
}

#[derive(Debug, Deserialize)]
struct RawKeyEntry {
    kid: String,
    private_key: Option<PathBuf>,
    public_key: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawAccount {
    first_name: String,
    last_name: String,
}

pub fn validate_config(config: &PasslineConfig) -> Result<(), ConfigError> {
    if config.token_ttl.is_zero() {
        return Err(ConfigError::Validation(
            "tokens.ttl_seconds must be greater than zero".to_string(),
        ));
    }

    let mut seen = BTreeSet::new();
    for entry in &config.keys.entries {
        if entry.kid.is_empty() {
            return Err(ConfigError::Validation("key entry with empty kid".to_string()));
        }
        if !seen.insert(entry.kid.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate key entry {}",
                entry.kid
            )));
        }
    }

    let active = config
        .keys
        .entries
        .iter()
        .find(|e| e.kid == config.keys.active)
        .ok_or_else(|| {
            ConfigError::Validation(format!(
                "keys.active {} points to missing key entry",
                config.keys.active
            ))
        })?;
    if active.private_key.is_none() {
        return Err(ConfigError::Validation(format!(
            "active key {} has no private_key",
            active.kid
        )));
    }

    if config.publisher.kind == PublisherKind::Broadcast {
        config.publisher.capacity().map_err(ConfigError::Validation)?;
    }

    Ok(())
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("passline")
    } else {
        PathBuf::from(".passline")
    }
}

pub fn load_config_from_dir(dir: &Path) -> Result<PasslineConfig, ConfigError> {
    load_config_from_file(&dir.join(CONFIG_FILE))
}

/// Load and validate a config file. Relative key paths resolve against the file's directory.
pub fn load_config_from_file(path: &Path) -> Result<PasslineConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let entries = raw
        .keys
        .entries
        .into_iter()
        .map(|e| KeyFileConfig {
            kid: e.kid,
            private_key: e.private_key.map(|p| base.join(p)),
            public_key: base.join(e.public_key),
        })
        .collect();

    let accounts = match raw.accounts {
        Some(accounts) => AccountDirectory::from_accounts(
            accounts
                .into_iter()
                .map(|(user_name, a)| Account::new(a.first_name, a.last_name, user_name)),
        )?,
        None => demo_directory(),
    };

    let config = PasslineConfig {
        token_ttl: Duration::from_secs(raw.tokens.ttl_seconds),
        keys: KeyConfig {
            active: raw.keys.active,
            entries,
        },
        accounts,
        publisher: raw.publisher,
    };
    validate_config(&config)?;
    Ok(config)
}

/// Write `passline.toml` into `dir` unless it already exists. Returns whether it was written.
pub fn write_default_config_files(dir: &Path) -> Result<bool, ConfigError> {
    fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(CONFIG_FILE);
    if path.exists() {
        return Ok(false);
    }
    fs::write(
        &path,
        include_str!("../../../docs/passline/passline.toml.example"),
    )
    .map_err(|source| ConfigError::Write { path, source })?;
    Ok(true)
}
