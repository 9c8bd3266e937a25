//! Yandex OAuth authorization for Yandex Disk clients.
//!
//! Three schemes are supported: `code` (the caller receives the code
//! through its own redirect), `screen_code` (Yandex shows the code to the
//! user) and `local_code` (a loopback listener catches the redirect).
//!
//! Feature flags:
//! - `axum`: serve the local redirect listener with axum
//! - `metrics`: record counters and histograms via `yandisk-metrics`

pub mod builder;
pub mod callback_server;
pub mod defaults;
pub mod error;
pub mod flow;
pub mod handler;
pub mod scheme;
pub mod scope;
mod security;
pub mod storage;
pub mod transport;
pub mod types;

pub use {
    builder::{AuthHandlerBuilder, generate_device_id},
    callback_server::{CallbackBackend, CallbackPage, CallbackServer},
    error::{Error, Result},
    flow::OAuthFlow,
    handler::AuthHandler,
    scheme::AuthScheme,
    scope::{AuthScope, AuthScopeSet, CustomScope},
    security::mask_token,
    storage::TokenStore,
    transport::Endpoints,
    types::{AuthCodeResponse, AuthResponse, StoredToken},
};
