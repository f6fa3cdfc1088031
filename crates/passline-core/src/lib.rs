mod config;
mod directory;

pub use config::{
    CONFIG_FILE, ConfigError, KeyConfig, KeyFileConfig, PasslineConfig, default_config_dir,
    load_config_from_dir, load_config_from_file, validate_config, write_default_config_files,
};
pub use directory::{AccountDirectory, demo_directory};
