//! Metric name and label definitions.
//!
//! All metric names used by yandisk live here so the set of exported series is
//! visible in one place.

/// Authorization flow metrics
pub mod oauth {
    /// Authorization URLs generated
    pub const AUTHORIZE_URLS_TOTAL: &str = "yandisk_oauth_authorize_urls_total";
    /// Requests received by the local callback listener
    pub const CALLBACK_REQUESTS_TOTAL: &str = "yandisk_oauth_callback_requests_total";
    /// Time spent waiting for the redirect, in seconds
    pub const CALLBACK_WAIT_SECONDS: &str = "yandisk_oauth_callback_wait_seconds";
    /// Token endpoint calls (exchange and refresh)
    pub const TOKEN_REQUESTS_TOTAL: &str = "yandisk_oauth_token_requests_total";
    /// Failed token endpoint calls
    pub const TOKEN_ERRORS_TOTAL: &str = "yandisk_oauth_token_errors_total";
    /// Token endpoint latency in seconds
    pub const TOKEN_REQUEST_DURATION_SECONDS: &str = "yandisk_oauth_token_request_duration_seconds";
}

/// Token storage metrics
pub mod storage {
    /// Token sets written to disk
    pub const TOKENS_SAVED_TOTAL: &str = "yandisk_storage_tokens_saved_total";
    /// Token sets read from disk
    pub const TOKENS_LOADED_TOTAL: &str = "yandisk_storage_tokens_loaded_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const SCHEME: &str = "scheme";
    pub const GRANT: &str = "grant";
    pub const OUTCOME: &str = "outcome";
    pub const ERROR_KIND: &str = "error_kind";
}
