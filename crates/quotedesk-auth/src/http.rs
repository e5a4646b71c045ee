//! HTTP primitives for the request pipeline.
//!
//! `ApiRequest` describes a call without performing it, so the pipeline
//! can park one during a refresh and replay it unchanged later. The
//! bearer credential is never part of the request description; it is
//! attached by `HttpSender` at the moment the bytes go out.

use crate::{AuthError, AuthResult};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Timeout applied to every outbound call.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// An outbound API request, replayable as-is.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        let mut request = Self::new(Method::POST, path);
        request.body = Some(body);
        request
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        let mut request = Self::new(Method::PUT, path);
        request.body = Some(body);
        request
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach an extra header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A completed response as seen by pipeline callers.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    /// Deserialize the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> AuthResult<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    /// Map non-2xx statuses to a typed error, passing 2xx through.
    pub fn error_for_status(self) -> AuthResult<ApiResponse> {
        if self.status.is_success() {
            return Ok(self);
        }
        Err(AuthError::Api {
            status: self.status,
            message: error_detail(&self.body),
        })
    }
}

/// Pull the server's error detail out of a response body.
pub(crate) fn error_detail(body: &Value) -> String {
    body.get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Low-level sender. Owns the reqwest client and the API base URL;
/// attaches whatever bearer credential it is handed at send time.
#[derive(Clone)]
pub(crate) struct HttpSender {
    http: Client,
    base_url: Url,
}

impl HttpSender {
    pub(crate) fn new(base_url: Url) -> AuthResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        self.base_url.join(path).map_err(AuthError::from)
    }

    /// Perform one request. Transport failures are classified into the
    /// retryability taxonomy; HTTP statuses are returned as data, not
    /// errors, so callers decide what each status means.
    pub(crate) async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> AuthResult<ApiResponse> {
        let request_id = Uuid::new_v4();
        let url = self.endpoint(&request.path)?;

        debug!(%request_id, method = %request.method, path = %request.path, "sending request");

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_transport_error)?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        debug!(%request_id, status = %status, "response received");

        Ok(ApiResponse { status, body })
    }
}

/// Classify reqwest transport failures.
fn classify_transport_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else if e.is_connect() {
        AuthError::NetworkUnavailable
    } else {
        AuthError::Http(e)
    }
}
