//! Token endpoint calls and response mapping.

use std::time::Instant;

use {
    reqwest::header::ACCEPT,
    secrecy::{ExposeSecret, Secret},
    serde_json::Value,
    tracing::{debug, warn},
    url::Url,
};

use crate::{
    defaults::USER_AGENT,
    error::{Error, Result},
    types::AuthResponse,
};

/// Authorization and token endpoints derived from one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize: String,
    pub token: String,
}

impl Endpoints {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)
            .map_err(|e| Error::InvalidConfig(format!("invalid OAuth base URL \"{base}\": {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let join = |segment: &str| {
            base.join(segment)
                .map(String::from)
                .map_err(|e| Error::InvalidConfig(format!("invalid OAuth endpoint: {e}")))
        };
        Ok(Self {
            authorize: join("authorize")?,
            token: join("token")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl Grant {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

pub(crate) fn default_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// Client credentials sent with HTTP Basic auth.
pub(crate) struct Credentials<'a> {
    pub(crate) client_id: &'a str,
    pub(crate) client_secret: &'a Secret<String>,
}

/// POST a grant to the token endpoint.
pub(crate) async fn request_token(
    client: &reqwest::Client,
    endpoint: &str,
    credentials: &Credentials<'_>,
    grant: Grant,
    params: &[(&str, &str)],
) -> Result<AuthResponse> {
    let started = Instant::now();
    let result = send(client, endpoint, credentials, grant, params).await;
    let elapsed = started.elapsed();

    match &result {
        Ok(_) => debug!(grant = grant.as_str(), ?elapsed, "token request succeeded"),
        Err(err) => warn!(grant = grant.as_str(), kind = err.kind(), error = %err, "token request failed"),
    }

    #[cfg(feature = "metrics")]
    {
        use yandisk_metrics::{counter, histogram, labels, oauth};
        counter!(oauth::TOKEN_REQUESTS_TOTAL, labels::GRANT => grant.as_str()).increment(1);
        histogram!(oauth::TOKEN_REQUEST_DURATION_SECONDS, labels::GRANT => grant.as_str())
            .record(elapsed.as_secs_f64());
        if let Err(err) = &result {
            counter!(
                oauth::TOKEN_ERRORS_TOTAL,
                labels::GRANT => grant.as_str(),
                labels::ERROR_KIND => err.kind()
            )
            .increment(1);
        }
    }

    result
}

async fn send(
    client: &reqwest::Client,
    endpoint: &str,
    credentials: &Credentials<'_>,
    grant: Grant,
    params: &[(&str, &str)],
) -> Result<AuthResponse> {
    let mut form: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 1);
    form.push(("grant_type", grant.as_str()));
    form.extend_from_slice(params);

    let resp = client
        .post(endpoint)
        .header(ACCEPT, "application/json")
        .basic_auth(
            credentials.client_id,
            Some(credentials.client_secret.expose_secret()),
        )
        .form(&form)
        .send()
        .await?;

    let status = resp.status().as_u16();
    let body = resp.text().await?;
    parse_token_response(status, &body)
}

/// Map a token endpoint response onto a token set or an [`Error`].
pub(crate) fn parse_token_response(status: u16, body: &str) -> Result<AuthResponse> {
    if status >= 500 {
        return Err(Error::Gateway { status });
    }

    let json: Option<Value> = serde_json::from_str(body).ok();
    if let Some(err) = json.as_ref().and_then(api_error) {
        return Err(err);
    }
    if !(200..300).contains(&status) {
        return Err(Error::Status { status });
    }

    let value =
        json.ok_or_else(|| Error::MalformedResponse("response body is not JSON".into()))?;
    serde_json::from_value(value).map_err(|e| Error::MalformedResponse(e.to_string()))
}

/// Extract `{"error": ..., "error_description" | "description": ...}`.
pub(crate) fn api_error(value: &Value) -> Option<Error> {
    let code = value.get("error")?.as_str()?;
    let description = value
        .get("error_description")
        .and_then(Value::as_str)
        .or_else(|| value.get("description").and_then(Value::as_str))
        .map(str::to_owned);
    Some(Error::api(code, description))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        axum::{Router, extract::Form, http::HeaderMap, routing::post},
        std::collections::HashMap,
    };

    /// Start a mock HTTP server and return its base URL.
    async fn start_mock(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn token_json() -> serde_json::Value {
        serde_json::json!({
            "token_type": "bearer",
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 31536000,
            "scope": "cloud_api:disk.info"
        })
    }

    #[test]
    fn endpoints_from_base() {
        let endpoints = Endpoints::new("https://oauth.yandex.com").unwrap();
        assert_eq!(endpoints.authorize, "https://oauth.yandex.com/authorize");
        assert_eq!(endpoints.token, "https://oauth.yandex.com/token");

        let proxied = Endpoints::new("http://127.0.0.1:9000/yandex").unwrap();
        assert_eq!(proxied.token, "http://127.0.0.1:9000/yandex/token");

        assert!(matches!(
            Endpoints::new("not a url"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn parse_success() {
        let resp = parse_token_response(200, &token_json().to_string()).unwrap();
        assert_eq!(resp.access_token.expose_secret(), "access-1");
        assert_eq!(resp.refresh_token.expose_secret(), "refresh-1");
        assert_eq!(resp.expires_in, 31_536_000);
    }

    #[test]
    fn parse_error_body_on_success_status() {
        let err = parse_token_response(200, r#"{"error": "bad_verification_code"}"#).unwrap_err();
        assert!(matches!(err, Error::Api { ref code, .. } if code == "bad_verification_code"));
    }

    #[test]
    fn parse_error_body_on_client_error() {
        let body = r#"{"error": "invalid_grant", "error_description": "Code has expired"}"#;
        let err = parse_token_response(400, body).unwrap_err();
        assert_eq!(err.to_string(), "Code has expired");

        let body = r#"{"error": "unauthorized", "description": "Unauthorized"}"#;
        let err = parse_token_response(401, body).unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn parse_server_error_is_gateway() {
        let err = parse_token_response(503, "<html>busy</html>").unwrap_err();
        assert!(matches!(err, Error::Gateway { status: 503 }));
        assert!(err.is_retryable());
    }

    #[test]
    fn parse_server_error_wins_over_json_error_body() {
        let body = r#"{"error": "server_error", "error_description": "Try again later"}"#;
        let err = parse_token_response(500, body).unwrap_err();
        assert!(matches!(err, Error::Gateway { status: 500 }));
    }

    #[test]
    fn parse_client_error_without_body() {
        let err = parse_token_response(404, "").unwrap_err();
        assert!(matches!(err, Error::Status { status: 404 }));
    }

    #[test]
    fn parse_missing_fields_is_malformed() {
        let err = parse_token_response(200, r#"{"access_token": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
        let err = parse_token_response(200, "not json").unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn request_token_sends_basic_auth_and_form() {
        let app = Router::new().route(
            "/token",
            post(
                |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                    // "client:secret" in base64
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_owned();
                    if auth != "Basic Y2xpZW50OnNlY3JldA=="
                        || form.get("grant_type").map(String::as_str) != Some("authorization_code")
                        || form.get("code").map(String::as_str) != Some("4821")
                        || form.get("device_id").map(String::as_str) != Some("device-1")
                    {
                        return (
                            axum::http::StatusCode::BAD_REQUEST,
                            axum::Json(serde_json::json!({"error": "unexpected_request"})),
                        );
                    }
                    (axum::http::StatusCode::OK, axum::Json(token_json()))
                },
            ),
        );
        let base = start_mock(app).await;
        let secret = Secret::new("secret".to_owned());
        let credentials = Credentials {
            client_id: "client",
            client_secret: &secret,
        };

        let resp = request_token(
            &client(),
            &format!("{base}/token"),
            &credentials,
            Grant::AuthorizationCode,
            &[("code", "4821"), ("device_id", "device-1")],
        )
        .await
        .unwrap();
        assert_eq!(resp.access_token.expose_secret(), "access-1");
    }

    #[tokio::test]
    async fn request_token_maps_server_error() {
        let app = Router::new().route(
            "/token",
            post(|| async { (axum::http::StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = start_mock(app).await;
        let secret = Secret::new("secret".to_owned());
        let credentials = Credentials {
            client_id: "client",
            client_secret: &secret,
        };

        let err = request_token(
            &client(),
            &format!("{base}/token"),
            &credentials,
            Grant::RefreshToken,
            &[("refresh_token", "r")],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Gateway { status: 502 }));
    }
}
