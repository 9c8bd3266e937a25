//! One-shot loopback listener for the local-code scheme.
//!
//! The server binds, waits for the first redirect that carries either a
//! `code` or an `error`, answers the browser with a small HTML page and is
//! torn down once [`CallbackServer::wait`] returns or the value is dropped.
//! Later requests that arrive before teardown get the page matching the
//! outcome that was already decided.

#[cfg(feature = "axum")]
mod axum_backend;
mod listener;

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use {
    tokio::{net::TcpListener, sync::oneshot, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{
    defaults::{DEFAULT_ERROR_MESSAGE, DEFAULT_SUCCESS_MESSAGE},
    error::{Error, Result},
    types::AuthCodeResponse,
};

const BODY_PREFIX: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>\u{1F511}</title></head><body style=\"display: flex;flex-direction: column;align-items: center;justify-content: center;height: 100dvh;box-sizing: border-box;margin: 0\"><p style=\"font-family: monospace;font-size: 2vw;font-weight: bold\">";
const BODY_SUFFIX: &str = "</p></body></html>";

/// How long teardown waits for in-flight responses to be flushed.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Which HTTP implementation serves the redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackBackend {
    /// Minimal HTTP/1.1 reader on a raw tokio socket.
    Tokio,
    /// axum router, available with the `axum` feature.
    #[cfg(feature = "axum")]
    Axum,
}

impl Default for CallbackBackend {
    fn default() -> Self {
        #[cfg(feature = "axum")]
        {
            Self::Axum
        }
        #[cfg(not(feature = "axum"))]
        {
            Self::Tokio
        }
    }
}

impl CallbackBackend {
    #[must_use]
    pub fn server_header(self) -> &'static str {
        match self {
            Self::Tokio => "yandisk (tokio)",
            #[cfg(feature = "axum")]
            Self::Axum => "yandisk (axum)",
        }
    }
}

/// Messages shown to the user after the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackPage {
    pub success_message: String,
    pub error_message: String,
}

impl Default for CallbackPage {
    fn default() -> Self {
        Self {
            success_message: DEFAULT_SUCCESS_MESSAGE.into(),
            error_message: DEFAULT_ERROR_MESSAGE.into(),
        }
    }
}

impl CallbackPage {
    #[must_use]
    pub fn render(&self, success: bool) -> String {
        let message = if success {
            &self.success_message
        } else {
            &self.error_message
        };
        format!("{BODY_PREFIX}{}{BODY_SUFFIX}", escape_html(message))
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Parse the redirect query into a code or the error Yandex reported.
pub fn parse_redirect_query(query: Option<&str>) -> Result<AuthCodeResponse> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;

    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {},
        }
    }

    if let Some(code) = code.filter(|c| !c.is_empty()) {
        return Ok(AuthCodeResponse {
            code,
            state: state.filter(|s| !s.is_empty()),
        });
    }
    if let Some(error) = error {
        return Err(Error::api(error, error_description));
    }
    Err(Error::MalformedCallback(
        "request does not contain one of: code, error".into(),
    ))
}

/// Response produced for one request, independent of the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    pub(crate) status: u16,
    pub(crate) content_type: &'static str,
    pub(crate) body: String,
}

impl Reply {
    fn page(page: &CallbackPage, success: bool) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=UTF-8",
            body: page.render(success),
        }
    }

    fn plain(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=UTF-8",
            body: body.to_owned(),
        }
    }
}

/// An outcome that still has to be handed to the waiter. Backends deliver
/// it once the reply is on its way.
pub(crate) struct Decision {
    tx: oneshot::Sender<Result<AuthCodeResponse>>,
    outcome: Result<AuthCodeResponse>,
}

impl Decision {
    pub(crate) fn deliver(self) {
        if self.tx.send(self.outcome).is_err() {
            debug!("redirect outcome dropped, nobody is waiting");
        }
    }
}

enum State {
    Pending(oneshot::Sender<Result<AuthCodeResponse>>),
    Decided(bool),
}

/// State shared between the backend tasks.
pub(crate) struct Shared {
    state: Mutex<State>,
    page: CallbackPage,
    redirect_path: String,
    pub(crate) backend: CallbackBackend,
}

impl Shared {
    pub(crate) fn handle(
        &self,
        method: &str,
        path: &str,
        query: Option<&str>,
    ) -> (Reply, Option<Decision>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let State::Decided(success) = *state {
            record_request("repeat");
            return (Reply::page(&self.page, success), None);
        }

        if method != "GET" {
            debug!(method, path, "ignoring non-GET request");
            record_request("ignored");
            return (Reply::plain(405, "method not allowed"), None);
        }
        if path != self.redirect_path {
            debug!(path, "ignoring request outside the redirect path");
            record_request("ignored");
            return (Reply::plain(404, "not found"), None);
        }

        let outcome = parse_redirect_query(query);
        let success = outcome.is_ok();
        match &outcome {
            Ok(_) => info!("authorization code received"),
            Err(err) => warn!(error = %err, "authorization redirect carried no code"),
        }
        record_request(if success { "code" } else { "error" });

        let decision = match std::mem::replace(&mut *state, State::Decided(success)) {
            State::Pending(tx) => Some(Decision { tx, outcome }),
            State::Decided(_) => None,
        };
        (Reply::page(&self.page, success), decision)
    }
}

#[cfg(feature = "metrics")]
fn record_request(outcome: &'static str) {
    use yandisk_metrics::{counter, labels, oauth};
    counter!(oauth::CALLBACK_REQUESTS_TOTAL, labels::OUTCOME => outcome).increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_request(_outcome: &'static str) {}

/// A bound redirect listener.
pub struct CallbackServer {
    local_addr: SocketAddr,
    rx: oneshot::Receiver<Result<AuthCodeResponse>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for CallbackServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackServer")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl CallbackServer {
    /// Bind `addr` with the default backend. Port `0` picks a free port.
    pub async fn bind(addr: SocketAddr, page: CallbackPage) -> Result<Self> {
        Self::bind_with(addr, page, CallbackBackend::default()).await
    }

    pub async fn bind_with(
        addr: SocketAddr,
        page: CallbackPage,
        backend: CallbackBackend,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::io(format!("failed to start auth server on {addr}"), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::io("failed to read auth server address", e))?;

        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending(tx)),
            page,
            redirect_path: "/".into(),
            backend,
        });

        let task = match backend {
            CallbackBackend::Tokio => tokio::spawn(listener::serve(listener, shared, shutdown_rx)),
            #[cfg(feature = "axum")]
            CallbackBackend::Axum => {
                tokio::spawn(axum_backend::serve(listener, shared, shutdown_rx))
            },
        };

        info!(addr = %local_addr, backend = backend.server_header(), "auth server listening");
        Ok(Self {
            local_addr,
            rx,
            shutdown: Some(shutdown_tx),
            task,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the redirect, then release the port.
    pub async fn wait(mut self, timeout: Duration) -> Result<AuthCodeResponse> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, &mut self.rx).await;

        #[cfg(feature = "metrics")]
        yandisk_metrics::histogram!(yandisk_metrics::oauth::CALLBACK_WAIT_SECONDS)
            .record(started.elapsed().as_secs_f64());

        self.stop().await;
        debug!(elapsed = ?started.elapsed(), "auth server stopped");

        match outcome {
            Err(_) => Err(Error::Limit("timed out waiting for auth code".into())),
            Ok(Err(_)) => Err(Error::MalformedCallback(
                "auth server stopped before a redirect arrived".into(),
            )),
            Ok(Ok(result)) => result,
        }
    }

    async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            self.task.abort();
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}
