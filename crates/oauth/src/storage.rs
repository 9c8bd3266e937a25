//! JSON token persistence.

use std::path::{Path, PathBuf};

use {
    tracing::{debug, info},
    yandisk_config::YanDiskConfig,
};

use crate::{
    error::{Error, Result},
    types::{AuthResponse, StoredToken, now_unix},
};

const TOKEN_FILENAME: &str = "token.json";

/// Stores the most recent token set in a single JSON file.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `token.json` in the platform data directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        yandisk_config::data_dir().map(|dir| dir.join(TOKEN_FILENAME))
    }

    /// `storage.token_path` when configured, else [`default_path`](Self::default_path).
    pub fn from_config(config: &YanDiskConfig) -> Result<Self> {
        config
            .storage
            .token_path
            .clone()
            .or_else(Self::default_path)
            .map(Self::new)
            .ok_or_else(|| Error::InvalidConfig("no data directory for the token store".into()))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored token, or `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<StoredToken>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored token");
                return Ok(None);
            },
            Err(e) => return Err(Error::io(format!("failed to read {}", self.path.display()), e)),
        };
        let token: StoredToken = serde_json::from_str(&raw)?;

        #[cfg(feature = "metrics")]
        yandisk_metrics::counter!(yandisk_metrics::storage::TOKENS_LOADED_TOTAL).increment(1);

        Ok(Some(token))
    }

    /// Save a freshly received token set, stamped with the current time.
    pub fn save(&self, response: &AuthResponse) -> Result<StoredToken> {
        let stored = StoredToken::new(response.clone(), now_unix());
        self.save_stored(&stored)?;
        Ok(stored)
    }

    /// Write via a temp file in the same directory, then rename over the
    /// target. On Unix the file is only readable by the owner.
    pub fn save_stored(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io(format!("failed to create {}", parent.display()), e))?;
        }

        let content = serde_json::to_vec_pretty(token)?;
        let tmp_path = self.path.with_extension("json.tmp");
        write_private(&tmp_path, &content)
            .map_err(|e| Error::io(format!("failed to write {}", tmp_path.display()), e))?;

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(Error::io(
                format!("failed to replace {}", self.path.display()),
                e,
            ));
        }

        #[cfg(feature = "metrics")]
        yandisk_metrics::counter!(yandisk_metrics::storage::TOKENS_SAVED_TOTAL).increment(1);

        info!(path = %self.path.display(), "token saved");
        Ok(())
    }

    /// Remove the stored token. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "token removed");
                Ok(true)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(
                format!("failed to remove {}", self.path.display()),
                e,
            )),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::{io::Write, os::unix::fs::OpenOptionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, secrecy::Secret};

    fn response(access: &str) -> AuthResponse {
        AuthResponse {
            access_token: Secret::new(access.into()),
            refresh_token: Secret::new("refresh".into()),
            expires_in: 3600,
            scope: Some("cloud_api:disk.info".into()),
        }
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("nested").join("token.json"));

        assert!(store.load().unwrap().is_none());

        let saved = store.save(&response("first")).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.response.access_token.expose_secret(), "first");
        assert_eq!(loaded.obtained_at, saved.obtained_at);
        assert_eq!(loaded.expires_at(), saved.obtained_at + 3600);

        store.save(&response("second")).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.response.access_token.expose_secret(), "second");
        assert!(!dir.path().join("nested").join("token.json.tmp").exists());

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&response("a")).unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TokenStore::new(path).load(),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn from_config_prefers_configured_path() {
        let mut config = YanDiskConfig::default();
        config.storage.token_path = Some(PathBuf::from("/tmp/custom-token.json"));
        let store = TokenStore::from_config(&config).unwrap();
        assert_eq!(store.path(), Path::new("/tmp/custom-token.json"));
    }
}
