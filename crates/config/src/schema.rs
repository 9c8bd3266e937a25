use std::path::PathBuf;

use {
    secrecy::Secret,
    serde::Deserialize,
};

/// Default wait for the local redirect, matching the lifetime of a Yandex
/// authorization code.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 600;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YanDiskConfig {
    pub oauth: OAuthSection,
    pub callback: CallbackSection,
    pub storage: StorageSection,
}

/// OAuth application settings, as registered at `https://oauth.yandex.com/`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OAuthSection {
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    /// One of `code`, `screen_code`, `local_code`.
    pub scheme: String,
    pub scopes: Vec<String>,
    pub redirect_uri: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    /// Overrides `https://oauth.yandex.com`.
    pub base_url: Option<String>,
}

impl Default for OAuthSection {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            scheme: "local_code".into(),
            scopes: Vec::new(),
            redirect_uri: None,
            device_id: None,
            device_name: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallbackSection {
    pub timeout_secs: u64,
    pub open_browser: bool,
    pub success_message: Option<String>,
    pub error_message: Option<String>,
}

impl Default for CallbackSection {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CALLBACK_TIMEOUT_SECS,
            open_browser: true,
            success_message: None,
            error_message: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Where the token set is persisted. Defaults to `<data dir>/token.json`.
    pub token_path: Option<PathBuf>,
}
