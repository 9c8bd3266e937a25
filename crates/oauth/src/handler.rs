//! Configured authorization handler for one scheme.

use std::{net::SocketAddr, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info},
    url::form_urlencoded::byte_serialize,
};

use crate::{
    builder::AuthHandlerBuilder,
    callback_server::{CallbackBackend, CallbackPage, CallbackServer},
    error::{Error, Result},
    scheme::AuthScheme,
    scope::AuthScopeSet,
    security::mask_token,
    transport::{Credentials, Endpoints, Grant, request_token},
    types::{AuthCodeResponse, AuthResponse},
};

/// Builds authorization URLs, receives codes and trades them for tokens.
#[derive(Debug)]
pub struct AuthHandler {
    pub(crate) scheme: AuthScheme,
    pub(crate) client_id: String,
    pub(crate) client_secret: Secret<String>,
    pub(crate) scopes: AuthScopeSet,
    pub(crate) device_id: Option<String>,
    pub(crate) device_name: Option<String>,
    pub(crate) redirect_uri: Option<String>,
    pub(crate) bind_addr: Option<SocketAddr>,
    pub(crate) state: Option<String>,
    pub(crate) page: CallbackPage,
    pub(crate) timeout: Duration,
    pub(crate) endpoints: Endpoints,
    pub(crate) backend: CallbackBackend,
    pub(crate) http: reqwest::Client,
}

impl AuthHandler {
    #[must_use]
    pub fn builder(scheme: AuthScheme) -> AuthHandlerBuilder {
        AuthHandlerBuilder::new(scheme)
    }

    #[must_use]
    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &Secret<String> {
        &self.client_secret
    }

    #[must_use]
    pub fn scopes(&self) -> &AuthScopeSet {
        &self.scopes
    }

    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Redirect URI sent to Yandex, if the scheme uses one.
    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    /// Listener address for [`AuthScheme::LocalCode`].
    #[must_use]
    pub fn bind_addr(&self) -> Option<SocketAddr> {
        self.bind_addr
    }

    #[must_use]
    pub fn callback_timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// The authorization URL the user has to visit.
    #[must_use]
    pub fn url(&self) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}",
            self.endpoints.authorize,
            encode(&self.client_id)
        );
        let optional = [
            ("device_id", self.device_id.as_deref()),
            ("device_name", self.device_name.as_deref()),
            ("redirect_uri", self.redirect_uri.as_deref()),
            ("state", self.state.as_deref()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                url.push('&');
                url.push_str(key);
                url.push('=');
                url.push_str(&encode(value));
            }
        }

        url.push_str("&scope=");
        let scopes: Vec<String> = self.scopes.iter().map(|s| encode(s.token())).collect();
        url.push_str(&scopes.join("%20"));

        #[cfg(feature = "metrics")]
        yandisk_metrics::counter!(
            yandisk_metrics::oauth::AUTHORIZE_URLS_TOTAL,
            yandisk_metrics::labels::SCHEME => self.scheme.as_str()
        )
        .increment(1);

        url
    }

    /// Open [`url`](Self::url) in the default browser.
    pub fn open_url(&self) -> Result<()> {
        let url = self.url();
        debug!(client_id = %mask_token(&self.client_id), "opening authorization URL");
        open::that(&url).map_err(|e| Error::io("failed to open browser", e))
    }

    /// Bind the redirect listener without waiting on it yet.
    pub async fn listen(&self) -> Result<CallbackServer> {
        let addr = match (self.scheme, self.bind_addr) {
            (AuthScheme::LocalCode, Some(addr)) => addr,
            _ => return Err(Error::Unsupported(self.scheme)),
        };
        CallbackServer::bind_with(addr, self.page.clone(), self.backend).await
    }

    /// Bind, wait for one redirect and release the port. Only available
    /// for [`AuthScheme::LocalCode`].
    pub async fn await_code(&self) -> Result<AuthCodeResponse> {
        let server = self.listen().await?;
        server.wait(self.timeout).await
    }

    /// Trade an authorization code for a token set.
    pub async fn exchange(&self, code: &str) -> Result<AuthResponse> {
        if code.is_empty() {
            return Err(Error::InvalidArgument("authorization code is empty".into()));
        }
        let mut params = vec![("code", code)];
        self.push_device_params(&mut params);

        info!(scheme = %self.scheme, "exchanging authorization code");
        request_token(
            &self.http,
            &self.endpoints.token,
            &self.credentials(),
            Grant::AuthorizationCode,
            &params,
        )
        .await
    }

    /// Obtain a new token set from a refresh token.
    pub async fn refresh(&self, refresh_token: &Secret<String>) -> Result<AuthResponse> {
        let mut params = vec![("refresh_token", refresh_token.expose_secret().as_str())];
        self.push_device_params(&mut params);

        info!("refreshing access token");
        request_token(
            &self.http,
            &self.endpoints.token,
            &self.credentials(),
            Grant::RefreshToken,
            &params,
        )
        .await
    }

    fn credentials(&self) -> Credentials<'_> {
        Credentials {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
        }
    }

    fn push_device_params<'a>(&'a self, params: &mut Vec<(&'a str, &'a str)>) {
        if let Some(id) = &self.device_id {
            params.push(("device_id", id.as_str()));
        }
        if let Some(name) = &self.device_name {
            params.push(("device_name", name.as_str()));
        }
    }
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::scope::AuthScope,
        axum::{Router, extract::Form, routing::post},
        std::collections::HashMap,
    };

    fn handler(scheme: AuthScheme) -> AuthHandlerBuilder {
        AuthHandler::builder(scheme)
            .client_id("my client")
            .client_secret("secret")
            .scopes([AuthScope::Info, AuthScope::Read])
    }

    #[test]
    fn url_for_code_scheme() {
        let handler = handler(AuthScheme::Code).build().unwrap();
        assert_eq!(
            handler.url(),
            "https://oauth.yandex.com/authorize?response_type=code&client_id=my+client\
             &scope=cloud_api%3Adisk.info%20cloud_api%3Adisk.read"
        );
    }

    #[test]
    fn url_includes_optional_parameters_in_order() {
        let handler = handler(AuthScheme::LocalCode)
            .device_id(Some("device-123".into()))
            .device_name(Some("My Laptop".into()))
            .redirect_uri(Some("http://localhost:9000/"))
            .unwrap()
            .state(Some("a/b=c"))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            handler.url(),
            "https://oauth.yandex.com/authorize?response_type=code&client_id=my+client\
             &device_id=device-123&device_name=My+Laptop\
             &redirect_uri=http%3A%2F%2Flocalhost%3A9000%2F&state=a%2Fb%3Dc\
             &scope=cloud_api%3Adisk.info%20cloud_api%3Adisk.read"
        );
    }

    #[test]
    fn url_uses_screen_code_redirect() {
        let handler = handler(AuthScheme::ScreenCode).build().unwrap();
        assert!(
            handler
                .url()
                .contains("&redirect_uri=https%3A%2F%2Foauth.yandex.com%2Fverification_code&")
        );
    }

    #[test]
    fn url_follows_base_override() {
        let handler = handler(AuthScheme::Code)
            .base_url("http://127.0.0.1:1/")
            .build()
            .unwrap();
        assert!(handler.url().starts_with("http://127.0.0.1:1/authorize?"));
    }

    #[tokio::test]
    async fn await_code_requires_local_scheme() {
        for scheme in [AuthScheme::Code, AuthScheme::ScreenCode] {
            let handler = handler(scheme).build().unwrap();
            let err = handler.await_code().await.unwrap_err();
            assert!(matches!(err, Error::Unsupported(s) if s == scheme));
        }
    }

    #[tokio::test]
    async fn await_code_times_out() {
        let handler = handler(AuthScheme::LocalCode)
            .redirect_uri(Some("http://127.0.0.1:0/"))
            .unwrap()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let err = handler.await_code().await.unwrap_err();
        assert_eq!(err.to_string(), "timed out waiting for auth code");
    }

    #[tokio::test]
    async fn exchange_and_refresh_send_device_params() {
        let app = Router::new().route(
            "/token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                let grant = form.get("grant_type").cloned().unwrap_or_default();
                let value = match grant.as_str() {
                    "authorization_code" => form.get("code").cloned(),
                    "refresh_token" => form.get("refresh_token").cloned(),
                    _ => None,
                }
                .unwrap_or_default();
                let device = form.get("device_id").cloned().unwrap_or_default();
                axum::Json(serde_json::json!({
                    "access_token": format!("{grant}:{value}:{device}"),
                    "refresh_token": "next-refresh",
                    "expires_in": 3600
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let handler = handler(AuthScheme::Code)
            .device_id(Some("device-123".into()))
            .base_url(format!("http://{addr}"))
            .http_client(reqwest::Client::builder().no_proxy().build().unwrap())
            .build()
            .unwrap();

        let tokens = handler.exchange("4821").await.unwrap();
        assert_eq!(
            tokens.access_token.expose_secret(),
            "authorization_code:4821:device-123"
        );

        let refreshed = handler.refresh(&tokens.refresh_token).await.unwrap();
        assert_eq!(
            refreshed.access_token.expose_secret(),
            "refresh_token:next-refresh:device-123"
        );
    }

    #[tokio::test]
    async fn exchange_rejects_empty_code() {
        let handler = handler(AuthScheme::Code).build().unwrap();
        assert!(matches!(
            handler.exchange("").await,
            Err(Error::InvalidArgument(_))
        ));
    }
}
