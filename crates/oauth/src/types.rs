use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

use crate::scope::AuthScopeSet;

/// Authorization code delivered by the redirect, with the state passed
/// through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthCodeResponse {
    pub code: String,
    pub state: Option<String>,
}

/// Token set returned by the token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    #[serde(serialize_with = "serialize_secret")]
    pub refresh_token: Secret<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AuthResponse {
    /// Yandex always issues bearer tokens.
    #[must_use]
    pub fn token_type(&self) -> &'static str {
        "bearer"
    }

    /// Value for the `Authorization` header of Disk API calls.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("OAuth {}", self.access_token.expose_secret())
    }

    /// Scopes actually granted, when the server reported them.
    #[must_use]
    pub fn granted_scopes(&self) -> Option<AuthScopeSet> {
        self.scope.as_deref().map(AuthScopeSet::from_param)
    }
}

/// A persisted [`AuthResponse`] together with the time it was obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(flatten)]
    pub response: AuthResponse,
    /// Unix timestamp (seconds) at which the token set was received.
    pub obtained_at: u64,
}

impl StoredToken {
    #[must_use]
    pub fn new(response: AuthResponse, obtained_at: u64) -> Self {
        Self {
            response,
            obtained_at,
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> u64 {
        self.obtained_at.saturating_add(self.response.expires_in)
    }

    /// True when the access token is expired at `now`, or will be within
    /// `skew_secs`.
    #[must_use]
    pub fn is_expired(&self, now: u64, skew_secs: u64) -> bool {
        self.expires_at() <= now.saturating_add(skew_secs)
    }
}

/// Current unix time in seconds.
#[must_use]
pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Serialize a secret as its plain value. Only used for persistence.
pub fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

#[cfg(test)]
mod tests {
    use {super::*, crate::scope::AuthScope};

    fn response() -> AuthResponse {
        serde_json::from_str(
            r#"{
                "token_type": "bearer",
                "access_token": "AQAAAACy1C6ZAAAAfa6vDLuItEy8pg-iIpnDxIs",
                "expires_in": 124234123534,
                "refresh_token": "1:GN686QVt0mmakDd9:A4pYuW9LGk0_UnlrMIWklkAuJkUWbq27loFekJVmSYrdfzdePBy7:A-2dHOmBxiXgajnD-kYOwQ",
                "scope": "cloud_api:disk.read cloud_api:disk.info"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn deserializes_token_endpoint_payload() {
        let resp = response();
        assert_eq!(
            resp.access_token.expose_secret(),
            "AQAAAACy1C6ZAAAAfa6vDLuItEy8pg-iIpnDxIs"
        );
        assert_eq!(resp.expires_in, 124_234_123_534);
        assert_eq!(resp.token_type(), "bearer");
        let scopes = resp.granted_scopes().unwrap();
        assert!(scopes.contains(&AuthScope::Read));
        assert!(scopes.contains(&AuthScope::Info));
    }

    #[test]
    fn missing_refresh_token_is_rejected() {
        let result: Result<AuthResponse, _> =
            serde_json::from_str(r#"{"access_token": "a", "expires_in": 10}"#);
        assert!(result.is_err());
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let rendered = format!("{:?}", response());
        assert!(!rendered.contains("AQAAAACy1C6Z"));
    }

    #[test]
    fn stored_token_expiry() {
        let mut resp = response();
        resp.expires_in = 3600;
        let stored = StoredToken::new(resp, 1_000);
        assert_eq!(stored.expires_at(), 4_600);
        assert!(!stored.is_expired(1_000, 60));
        assert!(stored.is_expired(4_550, 60));
        assert!(stored.is_expired(5_000, 0));
    }

    #[test]
    fn stored_token_json_is_flat() {
        let stored = StoredToken::new(response(), 42);
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["obtained_at"], 42);
        assert_eq!(
            value["access_token"],
            "AQAAAACy1C6ZAAAAfa6vDLuItEy8pg-iIpnDxIs"
        );
        let back: StoredToken = serde_json::from_value(value).unwrap();
        assert_eq!(back.obtained_at, 42);
        assert_eq!(back.response.scope, stored.response.scope);
    }

    #[test]
    fn authorization_header_uses_oauth_prefix() {
        assert_eq!(
            response().authorization_header(),
            "OAuth AQAAAACy1C6ZAAAAfa6vDLuItEy8pg-iIpnDxIs"
        );
    }
}
