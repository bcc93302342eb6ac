//! Buffered successful responses.

use bytes::Bytes;
use http::{HeaderMap, StatusCode, header};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{HttpClientError, Result};

/// A 2xx response with its body already read.
///
/// Non-success statuses never reach the caller as a `Response`; the transport
/// turns them into [`TransportError::Status`](crate::TransportError::Status)
/// so the retry loop can classify them.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: Url,
}

impl Response {
    /// Assemble a response, typically from inside a [`Transport`](crate::Transport).
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>, url: Url) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            url,
        }
    }

    /// Status code, always 2xx.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string; `None` if missing or not visible ASCII.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers.get(name.as_ref())?.to_str().ok()
    }

    /// Final URL, after any redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Raw body.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body decoded as UTF-8.
    pub fn text(&self) -> Result<String> {
        std::str::from_utf8(&self.body)
            .map(str::to_owned)
            .map_err(|e| HttpClientError::Decode(e.to_string()))
    }

    /// Body deserialized from JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpClientError::Json(e.to_string()))
    }

    /// Whether `Content-Type` declares JSON, including `+json` suffixes.
    pub fn is_json(&self) -> bool {
        self.header(header::CONTENT_TYPE)
            .is_some_and(|ct| ct.starts_with("application/json") || ct.contains("+json"))
    }
}
