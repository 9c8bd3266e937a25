//! Configuration loading for yandisk.
//!
//! Config files are looked up in the working directory first and then in the
//! platform config directory. Supported formats are TOML, YAML and JSON,
//! selected by file extension.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{
        CONFIG_FILENAMES, ConfigFormat, apply_env_overrides, config_dir, data_dir,
        discover_and_load, find_config_file, find_config_file_in, load_config, parse_config,
    },
    schema::{CallbackSection, OAuthSection, StorageSection, YanDiskConfig},
};
