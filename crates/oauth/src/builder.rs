use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use {
    rand::{Rng, distr::Alphanumeric},
    secrecy::Secret,
    tracing::debug,
    url::{Host, Url},
    yandisk_config::YanDiskConfig,
};

use crate::{
    callback_server::{CallbackBackend, CallbackPage},
    defaults::{
        DEFAULT_BASE_URL, DEFAULT_CALLBACK_TIMEOUT, DEFAULT_LOCAL_REDIRECT, DEVICE_ID_MAX_LEN,
        DEVICE_ID_MIN_LEN, DEVICE_NAME_MAX_LEN, MAX_STATE_LEN, SCREEN_CODE_REDIRECT,
    },
    error::{Error, Result},
    handler::AuthHandler,
    scheme::AuthScheme,
    scope::{AuthScope, AuthScopeSet},
    transport::{Endpoints, default_client},
};

const RANDOM_STATE_LEN: usize = 32;

/// Collects the parameters of an [`AuthHandler`].
///
/// Redirect and state checks run in their setters; required fields and
/// device parameters are checked by [`build`](Self::build).
#[derive(Debug)]
pub struct AuthHandlerBuilder {
    scheme: AuthScheme,
    client_id: Option<String>,
    client_secret: Option<Secret<String>>,
    scopes: AuthScopeSet,
    device_id: Option<String>,
    device_name: Option<String>,
    redirect_uri: Option<String>,
    bind_addr: Option<SocketAddr>,
    state: Option<String>,
    page: CallbackPage,
    timeout: Duration,
    base_url: String,
    backend: CallbackBackend,
    http_client: Option<reqwest::Client>,
}

impl AuthHandlerBuilder {
    #[must_use]
    pub fn new(scheme: AuthScheme) -> Self {
        Self {
            scheme,
            client_id: None,
            client_secret: None,
            scopes: AuthScopeSet::new(),
            device_id: None,
            device_name: None,
            redirect_uri: None,
            bind_addr: None,
            state: None,
            page: CallbackPage::default(),
            timeout: DEFAULT_CALLBACK_TIMEOUT,
            base_url: DEFAULT_BASE_URL.into(),
            backend: CallbackBackend::default(),
            http_client: None,
        }
    }

    /// Seed a builder from the `[oauth]` and `[callback]` config sections.
    pub fn from_config(config: &YanDiskConfig) -> Result<Self> {
        let oauth = &config.oauth;
        let scheme: AuthScheme = oauth.scheme.parse().map_err(Error::InvalidConfig)?;

        let mut builder = Self::new(scheme)
            .scopes(oauth.scopes.iter().map(AuthScope::of))
            .device_id(oauth.device_id.clone())
            .device_name(oauth.device_name.clone())
            .timeout(Duration::from_secs(config.callback.timeout_secs))
            .redirect_uri(oauth.redirect_uri.as_deref())?;

        if let Some(id) = &oauth.client_id {
            builder = builder.client_id(id.clone());
        }
        if let Some(secret) = &oauth.client_secret {
            builder.client_secret = Some(secret.clone());
        }
        if let Some(base) = &oauth.base_url {
            builder = builder.base_url(base.clone());
        }
        if let Some(message) = &config.callback.success_message {
            builder = builder.success_message(message.clone());
        }
        if let Some(message) = &config.callback.error_message {
            builder = builder.error_message(message.clone());
        }
        Ok(builder)
    }

    #[must_use]
    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(Secret::new(client_secret.into()));
        self
    }

    /// Replace the requested scopes.
    #[must_use]
    pub fn scopes(mut self, scopes: impl IntoIterator<Item = AuthScope>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn add_scope(mut self, scope: AuthScope) -> Self {
        self.scopes.insert(scope);
        self
    }

    #[must_use]
    pub fn device_id(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    #[must_use]
    pub fn device_name(mut self, device_name: Option<String>) -> Self {
        self.device_name = device_name;
        self
    }

    /// Set the redirect target. `None` restores the scheme default.
    pub fn redirect_uri(mut self, redirect_uri: Option<&str>) -> Result<Self> {
        match (self.scheme, redirect_uri) {
            (AuthScheme::ScreenCode, Some(uri)) if uri != SCREEN_CODE_REDIRECT => {
                return Err(Error::InvalidArgument(format!(
                    "redirect URI for screen_code must be {SCREEN_CODE_REDIRECT}"
                )));
            },
            (AuthScheme::LocalCode, Some(uri)) => {
                self.bind_addr = Some(local_bind_addr(uri)?);
            },
            (AuthScheme::LocalCode, None) => self.bind_addr = None,
            _ => {},
        }
        self.redirect_uri = redirect_uri.map(str::to_owned);
        Ok(self)
    }

    pub fn state(mut self, state: Option<impl Into<String>>) -> Result<Self> {
        let state = state.map(Into::into);
        if let Some(state) = &state
            && state.encode_utf16().count() > MAX_STATE_LEN
        {
            return Err(Error::InvalidArgument(format!(
                "state may not exceed {MAX_STATE_LEN} characters"
            )));
        }
        self.state = state;
        Ok(self)
    }

    /// Use a random alphanumeric state, verified by [`crate::OAuthFlow`].
    #[must_use]
    pub fn random_state(mut self) -> Self {
        let state: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_STATE_LEN)
            .map(char::from)
            .collect();
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn success_message(mut self, message: impl Into<String>) -> Self {
        self.page.success_message = message.into();
        self
    }

    #[must_use]
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.page.error_message = message.into();
        self
    }

    /// How long the local-code listener waits for the redirect.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override `https://oauth.yandex.com`, e.g. for a proxy or a test server.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn callback_backend(mut self, backend: CallbackBackend) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<AuthHandler> {
        let client_id = self
            .client_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::InvalidConfig("client ID is not set".into()))?;
        let client_secret = self
            .client_secret
            .ok_or_else(|| Error::InvalidConfig("client secret is not set".into()))?;
        if self.scopes.is_empty() {
            return Err(Error::InvalidConfig("no scopes are set".into()));
        }
        if let Some(id) = &self.device_id {
            validate_device_id(id)?;
        }
        if let Some(name) = &self.device_name {
            validate_device_name(name)?;
        }

        let (redirect_uri, bind_addr) = match self.scheme {
            AuthScheme::Code => (self.redirect_uri, None),
            AuthScheme::ScreenCode => (Some(SCREEN_CODE_REDIRECT.to_owned()), None),
            AuthScheme::LocalCode => match (self.redirect_uri, self.bind_addr) {
                (Some(uri), Some(addr)) => (Some(uri), Some(addr)),
                _ => (
                    Some(DEFAULT_LOCAL_REDIRECT.to_owned()),
                    Some(local_bind_addr(DEFAULT_LOCAL_REDIRECT)?),
                ),
            },
        };

        let endpoints = Endpoints::new(&self.base_url)?;
        let http = match self.http_client {
            Some(client) => client,
            None => default_client()?,
        };

        debug!(scheme = %self.scheme, scopes = %self.scopes.to_param(), "auth handler built");
        Ok(AuthHandler {
            scheme: self.scheme,
            client_id,
            client_secret,
            scopes: self.scopes,
            device_id: self.device_id,
            device_name: self.device_name,
            redirect_uri,
            bind_addr,
            state: self.state,
            page: self.page,
            timeout: self.timeout,
            endpoints,
            backend: self.backend,
            http,
        })
    }
}

/// Fresh random device id that satisfies the device id rules.
#[must_use]
pub fn generate_device_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn validate_device_id(id: &str) -> Result<()> {
    let len = id.chars().count();
    if !(DEVICE_ID_MIN_LEN..=DEVICE_ID_MAX_LEN).contains(&len) {
        return Err(Error::InvalidArgument(format!(
            "device ID must be {DEVICE_ID_MIN_LEN} to {DEVICE_ID_MAX_LEN} characters long"
        )));
    }
    if !id.bytes().all(|b| (32..=126).contains(&b)) {
        return Err(Error::InvalidArgument(
            "device ID may only contain printable ASCII characters".into(),
        ));
    }
    Ok(())
}

fn validate_device_name(name: &str) -> Result<()> {
    if name.chars().count() > DEVICE_NAME_MAX_LEN {
        return Err(Error::InvalidArgument(format!(
            "device name may not exceed {DEVICE_NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// Listener address for a local-code redirect URI.
fn local_bind_addr(uri: &str) -> Result<SocketAddr> {
    let invalid = |reason: &str| Error::InvalidArgument(format!("redirect URI \"{uri}\" {reason}"));

    let url = Url::parse(uri).map_err(|e| invalid(&format!("is not a valid URL ({e})")))?;
    if url.scheme() != "http" {
        return Err(invalid("must use the http scheme"));
    }
    if !matches!(url.path(), "" | "/") {
        return Err(invalid("must not have a path"));
    }
    let ip: IpAddr = match url.host() {
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            Ipv4Addr::LOCALHOST.into()
        },
        Some(Host::Ipv4(ip)) if ip.is_loopback() => ip.into(),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => ip.into(),
        _ => return Err(invalid("must point to a loopback address")),
    };
    let port = url.port_or_known_default().unwrap_or(80);
    Ok(SocketAddr::new(ip, port))
}
