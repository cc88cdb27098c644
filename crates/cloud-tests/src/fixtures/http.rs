//! Shared HTTP plumbing for the cloud API clients.
//!
//! Every client sends JSON with an `X-Auth-Token` header and maps failure
//! statuses onto [`CloudError`] the same way.

use common::error::{CloudError, Result};
use common::secret::{ExposeSecret, SecretString};
use regex::Regex;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, instrument};

/// Maximum length for error body in error messages.
const MAX_ERROR_BODY_LEN: usize = 256;

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the identity token on every request.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Regex pattern for identity tokens echoed back in JSON bodies.
#[allow(clippy::expect_used)]
static TOKEN_FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)"(token|password|x-auth-token)"\s*:\s*"[^"]{16,}""#)
        .expect("token field pattern is valid")
});

/// Regex pattern for header-style tokens in text.
#[allow(clippy::expect_used)]
static TOKEN_HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)x-(auth|subject)-token:\s*\S+").expect("token header pattern is valid")
});

/// Sanitize error response body to remove sensitive data.
///
/// This function:
/// - Removes header-style token echoes (`X-Auth-Token: ...`)
/// - Removes long token-like JSON string fields
/// - Truncates long bodies to MAX_ERROR_BODY_LEN
pub(crate) fn sanitize_error_body(body: &str) -> String {
    let sanitized = TOKEN_HEADER_PATTERN.replace_all(body, "[TOKEN_REDACTED]");
    let sanitized = TOKEN_FIELD_PATTERN.replace_all(&sanitized, "\"$1\": \"[REDACTED]\"");

    if sanitized.len() > MAX_ERROR_BODY_LEN {
        let mut end = MAX_ERROR_BODY_LEN;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", sanitized.get(..end).unwrap_or_default())
    } else {
        sanitized.into_owned()
    }
}

/// Map a non-success status onto the error taxonomy.
pub(crate) fn status_error(status: StatusCode, body: &str) -> CloudError {
    let body = sanitize_error_body(body);
    match status {
        StatusCode::NOT_FOUND => CloudError::NotFound(body),
        StatusCode::CONFLICT => CloudError::Conflict(body),
        StatusCode::FORBIDDEN => CloudError::Forbidden(body),
        other => CloudError::RequestFailed {
            status: other.as_u16(),
            body,
        },
    }
}

/// Return the response if successful, otherwise the mapped error.
pub(crate) async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

/// Build the HTTP client used by all API clients.
pub(crate) fn build_http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()?)
}

/// Authenticated JSON client for one service endpoint.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: SecretString,
    http_client: Client,
}

impl ApiClient {
    /// Create a client for `base_url` using an already issued token.
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            http_client: build_http_client(DEFAULT_HTTP_TIMEOUT)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and decode the JSON answer.
    ///
    /// Empty bodies (e.g. `204 No Content`) decode to `Value::Null`.
    /// Query parameters are form-encoded, so names containing `&`, `+` or
    /// spaces reach the server intact.
    #[instrument(skip(self, query, body), fields(base_url = %self.base_url))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header(AUTH_TOKEN_HEADER, self.token.expose_secret())
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = check_response(request.send().await?).await?;
        debug!(
            target: "cloudcheck.http",
            %method,
            path,
            status = %response.status(),
            "Request succeeded"
        );

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, &[], None).await
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request(Method::PUT, path, &[], body).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path, &[], None).await.map(|_| ())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}
