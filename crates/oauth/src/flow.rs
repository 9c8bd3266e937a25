use tracing::{info, warn};

use crate::{
    error::{Error, Result},
    handler::AuthHandler,
    security::constant_time_eq,
    types::{AuthCodeResponse, AuthResponse},
};

/// Drives a complete authorization: show the URL, obtain the code, check
/// the state and exchange the code for tokens.
pub struct OAuthFlow {
    handler: AuthHandler,
    open_browser: bool,
}

impl OAuthFlow {
    #[must_use]
    pub fn new(handler: AuthHandler) -> Self {
        Self {
            handler,
            open_browser: true,
        }
    }

    #[must_use]
    pub fn open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    #[must_use]
    pub fn handler(&self) -> &AuthHandler {
        &self.handler
    }

    /// Log the authorization URL and open it when browser launching is on.
    /// A browser that fails to start is not fatal, the URL is still logged.
    pub fn present_url(&self) -> String {
        let url = self.handler.url();
        info!(scheme = %self.handler.scheme(), "visit this URL to authorize: {url}");
        if self.open_browser
            && let Err(e) = self.handler.open_url()
        {
            warn!(error = %e, "could not open a browser, open the URL manually");
        }
        url
    }

    /// Local-code flow. The listener is bound before the URL is shown so
    /// that a fast redirect cannot arrive at a closed port.
    pub async fn run(&self) -> Result<AuthResponse> {
        let server = self.handler.listen().await?;
        self.present_url();

        let code = server.wait(self.handler.callback_timeout()).await?;
        self.verify_state(&code)?;
        info!("authorization code accepted, requesting tokens");
        self.handler.exchange(&code.code).await
    }

    /// Finish a code or screen-code flow with a code the user typed in.
    pub async fn run_with_code(&self, code: &str) -> Result<AuthResponse> {
        let code = code.trim();
        if code.is_empty() {
            return Err(Error::InvalidArgument("authorization code is empty".into()));
        }
        self.handler.exchange(code).await
    }

    fn verify_state(&self, response: &AuthCodeResponse) -> Result<()> {
        let Some(expected) = self.handler.state() else {
            return Ok(());
        };
        match response.state.as_deref() {
            Some(received) if constant_time_eq(expected.as_bytes(), received.as_bytes()) => Ok(()),
            _ => {
                warn!("redirect state does not match");
                Err(Error::StateMismatch)
            },
        }
    }
}
