use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://oauth.yandex.com";

/// Fixed redirect target of the screen-code scheme.
pub const SCREEN_CODE_REDIRECT: &str = "https://oauth.yandex.com/verification_code";

pub const DEFAULT_LOCAL_PORT: u16 = 8127;
pub const DEFAULT_LOCAL_REDIRECT: &str = "http://127.0.0.1:8127/";

/// Authorization codes expire after ten minutes.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(600);

pub const DEFAULT_SUCCESS_MESSAGE: &str =
    "Authentication successful. You may now close this window.";
pub const DEFAULT_ERROR_MESSAGE: &str = "Failed to authenticate at this time.";

pub const MAX_STATE_LEN: usize = 1024;

pub const DEVICE_ID_MIN_LEN: usize = 6;
pub const DEVICE_ID_MAX_LEN: usize = 50;
pub const DEVICE_NAME_MAX_LEN: usize = 100;

pub const USER_AGENT: &str = concat!("yandisk/", env!("CARGO_PKG_VERSION"));
