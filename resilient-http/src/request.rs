//! Request description and builder.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, header};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::{ErrorCode, HttpClientError, Result};
use crate::retry::RetryConfigOverride;
use crate::{ResilientClient, Response};

/// A fully built request, ready to hand to a [`Transport`](crate::Transport).
///
/// Requests are immutable once built; every retry attempt sends the same
/// method, URL, headers and body.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
    overrides: RetryConfigOverride,
}

impl Request {
    /// Create a request with no headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            overrides: RetryConfigOverride::default(),
        }
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Per-request retry overrides.
    pub fn overrides(&self) -> &RetryConfigOverride {
        &self.overrides
    }
}

/// HTTP request builder.
pub struct RequestBuilder<'a> {
    client: &'a ResilientClient,
    method: Method,
    url: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Bytes>,
    overrides: RetryConfigOverride,
    error: Option<HttpClientError>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(client: &'a ResilientClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            overrides: RetryConfigOverride::default(),
            error: None,
        }
    }

    /// Set a header, replacing any earlier value (names are case-insensitive).
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => self.fail(HttpClientError::RequestBuild(format!("invalid header: {}", name))),
        }
        self
    }

    /// Merge a prepared header map; later values replace earlier ones.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in &headers {
            self.headers.insert(name, value.clone());
        }
        self
    }

    /// Append `key=value` to the query string.
    pub fn query(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.queries([(key, value)])
    }

    /// Append several query pairs in order.
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Raw body bytes, sent as-is on every attempt.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// UTF-8 text body; defaults `Content-Type` to `text/plain`.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.default_content_type("text/plain; charset=utf-8");
        self.body = Some(Bytes::from(text.into()));
        self
    }

    /// JSON body.
    ///
    /// Sets `Content-Type: application/json` unless the request or the
    /// client's default headers already give one.
    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        match serde_json::to_vec(json) {
            Ok(bytes) => {
                self.default_content_type("application/json");
                self.body = Some(Bytes::from(bytes));
            }
            Err(e) => self.fail(HttpClientError::Json(e.to_string())),
        }
        self
    }

    /// URL-encoded form body.
    pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Self {
        match serde_urlencoded::to_string(form) {
            Ok(encoded) => {
                self.default_content_type("application/x-www-form-urlencoded");
                self.body = Some(Bytes::from(encoded));
            }
            Err(e) => self.fail(HttpClientError::RequestBuild(e.to_string())),
        }
        self
    }

    /// Set a per-attempt timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.overrides.timeout = Some(timeout);
        self
    }

    /// Set the number of retries for this request.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.overrides.max_retries = Some(max_retries);
        self
    }

    /// Replace the retryable status codes for this request.
    pub fn retry_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.overrides.retryable_statuses = Some(statuses.into_iter().collect::<HashSet<_>>());
        self
    }

    /// Replace the retryable network error codes for this request.
    pub fn retry_error_codes(mut self, codes: impl IntoIterator<Item = ErrorCode>) -> Self {
        self.overrides.retryable_error_codes = Some(codes.into_iter().collect::<HashSet<_>>());
        self
    }

    /// Apply a full set of retry overrides for this request.
    pub fn retry_override(mut self, overrides: RetryConfigOverride) -> Self {
        self.overrides = overrides;
        self
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer_auth(self, token: impl AsRef<str>) -> Self {
        self.header(header::AUTHORIZATION, format!("Bearer {}", token.as_ref()))
    }

    /// `Authorization: Basic` with base64 credentials.
    pub fn basic_auth(self, username: impl AsRef<str>, password: Option<impl AsRef<str>>) -> Self {
        use base64::Engine;
        let credentials = match password {
            Some(p) => format!("{}:{}", username.as_ref(), p.as_ref()),
            None => format!("{}:", username.as_ref()),
        };
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        self.header(header::AUTHORIZATION, format!("Basic {}", encoded))
    }

    /// Build the request without sending it.
    pub fn build(self) -> Result<Request> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let url = self.build_url()?;

        let mut headers = self.client.default_headers().clone();
        for (name, value) in &self.headers {
            headers.insert(name, value.clone());
        }

        Ok(Request {
            method: self.method,
            url,
            headers,
            body: self.body,
            overrides: self.overrides,
        })
    }

    /// Build and execute through the client.
    pub async fn send(self) -> Result<Response> {
        let client = self.client;
        let request = self.build()?;
        client.execute(request).await
    }

    /// Resolve against the base URL, then append query pairs.
    fn build_url(&self) -> Result<Url> {
        let mut url = match self.client.base_url() {
            Some(base) => base
                .join(&self.url)
                .map_err(|e| HttpClientError::InvalidUrl(format!("{}: {}", self.url, e)))?,
            None => Url::parse(&self.url)
                .map_err(|e| HttpClientError::InvalidUrl(format!("{}: {}", self.url, e)))?,
        };

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        Ok(url)
    }

    // A content type from the request or the client defaults wins.
    fn default_content_type(&mut self, content_type: &'static str) {
        if self.client.default_headers().contains_key(header::CONTENT_TYPE) {
            return;
        }
        self.headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type));
    }

    // Keep the first error; later builder calls can't fix it.
    fn fail(&mut self, error: HttpClientError) {
        self.error.get_or_insert(error);
    }
}
