use std::path::{Path, PathBuf};

use {
    directories::ProjectDirs,
    secrecy::Secret,
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    schema::YanDiskConfig,
};

/// File names probed in each candidate directory, in priority order.
pub const CONFIG_FILENAMES: &[&str] = &[
    "yandisk.toml",
    "yandisk.yaml",
    "yandisk.yml",
    "yandisk.json",
];

const ENV_CLIENT_ID: &str = "YANDISK_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "YANDISK_CLIENT_SECRET";
const ENV_REDIRECT_URI: &str = "YANDISK_REDIRECT_URI";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io.github", "wasabithumb", "yandisk")
}

/// Platform config directory (e.g. `~/.config/yandisk`).
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().to_path_buf())
}

/// Platform data directory, used for the token store.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.data_dir().to_path_buf())
}

/// First config file found in `dirs`, honouring [`CONFIG_FILENAMES`] order.
#[must_use]
pub fn find_config_file_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file())
}

/// Looks in the working directory, then in [`config_dir`].
#[must_use]
pub fn find_config_file() -> Option<PathBuf> {
    let mut dirs = Vec::with_capacity(2);
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(dir) = config_dir() {
        dirs.push(dir);
    }
    find_config_file_in(&dirs)
}

pub fn parse_config(raw: &str, format: ConfigFormat, path: &Path) -> Result<YanDiskConfig> {
    let parsed: std::result::Result<YanDiskConfig, String> = match format {
        ConfigFormat::Toml => toml::from_str(raw).map_err(|e| e.to_string()),
        ConfigFormat::Yaml => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
        ConfigFormat::Json => serde_json::from_str(raw).map_err(|e| e.to_string()),
    };
    parsed.map_err(|message| Error::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Load a config file, picking the parser from its extension.
pub fn load_config(path: &Path) -> Result<YanDiskConfig> {
    let format =
        ConfigFormat::from_path(path).ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&raw, format, path)?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Apply `YANDISK_*` overrides. `lookup` is usually `std::env::var(..).ok()`.
pub fn apply_env_overrides(config: &mut YanDiskConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(id) = lookup(ENV_CLIENT_ID).filter(|v| !v.is_empty()) {
        debug!("client id taken from {ENV_CLIENT_ID}");
        config.oauth.client_id = Some(id);
    }
    if let Some(secret) = lookup(ENV_CLIENT_SECRET).filter(|v| !v.is_empty()) {
        debug!("client secret taken from {ENV_CLIENT_SECRET}");
        config.oauth.client_secret = Some(Secret::new(secret));
    }
    if let Some(uri) = lookup(ENV_REDIRECT_URI).filter(|v| !v.is_empty()) {
        config.oauth.redirect_uri = Some(uri);
    }
}

/// Load `explicit` when given, otherwise the discovered file, otherwise the
/// defaults. Environment overrides are applied last.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<YanDiskConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };
    let mut config = match path {
        Some(path) => load_config(&path)?,
        None => {
            debug!("no config file found, using defaults");
            YanDiskConfig::default()
        },
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}
