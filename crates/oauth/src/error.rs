use crate::scheme::AuthScheme;

/// Errors raised while authorizing against Yandex OAuth.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request went through but Yandex reported an error.
    #[error("{description}")]
    Api { code: String, description: String },

    /// 5xx from the server. Yandex recommends repeating the request.
    #[error("unexpected server error (HTTP {status})")]
    Gateway { status: u16 },

    /// Non-2xx response without an error body.
    #[error("API reported a client error but did not provide further information (HTTP {status})")]
    Status { status: u16 },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A limit was hit, e.g. the authorization code expired while waiting.
    #[error("{0}")]
    Limit(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("auth scheme {0} cannot receive the authorization code automatically")]
    Unsupported(AuthScheme),

    #[error("redirect state does not match the requested state")]
    StateMismatch,

    #[error("malformed redirect: {0}")]
    MalformedCallback(String),

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] yandisk_config::Error),
}

impl Error {
    /// Build an [`Error::Api`], falling back to a generic description.
    pub fn api(code: impl Into<String>, description: Option<String>) -> Self {
        let code = code.into();
        let description =
            description.unwrap_or_else(|| format!("Unknown Yandex API error ({code})"));
        Self::Api { code, description }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Gateway { .. } => true,
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Api { .. } => "api",
            Self::Gateway { .. } => "gateway",
            Self::Status { .. } => "status",
            Self::Http(_) => "http",
            Self::Io { .. } => "io",
            Self::Limit(_) => "limit",
            Self::InvalidConfig(_) => "invalid_config",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Unsupported(_) => "unsupported",
            Self::StateMismatch => "state_mismatch",
            Self::MalformedCallback(_) => "malformed_callback",
            Self::MalformedResponse(_) => "malformed_response",
            Self::Json(_) => "json",
            Self::Config(_) => "config",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
