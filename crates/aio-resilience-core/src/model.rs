//! The `Request`/`Response` value types the rest of the core operates on.

use std::collections::HashMap;

use bytes::Bytes;
use futures::future::BoxFuture;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

/// Header names the core reads or writes itself.
pub mod header {
    pub const X_REQUEST_DEADLINE_AT: &str = "x-request-deadline-at";
    pub const X_REQUEST_TIMEOUT: &str = "x-request-timeout";
    pub const X_REQUEST_PRIORITY: &str = "x-request-priority";
    pub const X_DO_NOT_RETRY: &str = "x-do-not-retry";
    pub const X_CIRCUIT_BREAKER: &str = "x-circuit-breaker";
}

/// An immutable, freely-clonable request value.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub allow_redirects: bool,
    pub max_redirects: u32,
}

impl Request {
    pub fn builder(method: Method, url: Url) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// Returns a copy of this request with `extra` merged in, `extra` winning
    /// on duplicate header names.
    pub fn update_headers(&self, extra: &HeaderMap) -> Request {
        let mut headers = self.headers.clone();
        for (name, value) in extra {
            headers.insert(name.clone(), value.clone());
        }
        Request { headers, ..self.clone() }
    }
}

/// Builds a [`Request`], composing path and query parameters into the URL.
pub struct RequestBuilder {
    method: Method,
    url: Url,
    path_params: HashMap<String, String>,
    query_params: HashMap<String, Vec<Option<String>>>,
    headers: HeaderMap,
    body: Option<Bytes>,
    allow_redirects: bool,
    max_redirects: u32,
}

impl RequestBuilder {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            path_params: HashMap::new(),
            query_params: HashMap::new(),
            headers: HeaderMap::new(),
            body: None,
            allow_redirects: true,
            max_redirects: 10,
        }
    }

    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Adds a query parameter value. Passing `None` is equivalent to not
    /// calling this at all for a scalar parameter, and is dropped rather than
    /// emitted as `key=`. Call multiple times with the same name to produce a
    /// repeated-key list parameter.
    pub fn query_param(mut self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.query_params
            .entry(name.into())
            .or_default()
            .push(value.map(Into::into));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = allow;
        self
    }

    pub fn max_redirects(mut self, max: u32) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn build(self) -> Request {
        let mut url = self.url;

        if !self.path_params.is_empty() {
            let mut path = url.path().to_string();
            for (name, value) in &self.path_params {
                let needle = format!("{{{name}}}");
                let encoded = url::form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>();
                path = path.replace(&needle, &encoded);
            }
            url.set_path(&path);
        }

        if !self.query_params.is_empty() {
            let mut pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            for (name, values) in &self.query_params {
                for value in values.iter().flatten() {
                    pairs.push((name.clone(), value.clone()));
                }
            }
            if pairs.is_empty() {
                url.set_query(None);
            } else {
                let mut serializer = url.query_pairs_mut();
                serializer.clear();
                for (k, v) in &pairs {
                    serializer.append_pair(k, v);
                }
            }
        }

        Request {
            method: self.method,
            url,
            headers: self.headers,
            body: self.body,
            allow_redirects: self.allow_redirects,
            max_redirects: self.max_redirects,
        }
    }
}

/// A response capable of yielding its body and being explicitly closed.
///
/// Implementors that own network resources (connections, buffered reads)
/// must release them in `close`. [`EmptyResponse`] is the zero-cost synthetic
/// implementation used for fallbacks and short-circuits.
pub trait Response: Send + Sync {
    fn status(&self) -> u16;
    fn headers(&self) -> &HeaderMap;
    /// Observed wall-clock duration of the call, in seconds, or `-1.0` if unknown.
    fn elapsed(&self) -> f64;
    fn read(&self) -> BoxFuture<'_, Bytes>;
    fn close(&self) -> BoxFuture<'_, ()>;

    fn is_informational(&self) -> bool {
        (100..200).contains(&self.status())
    }
    fn is_successful(&self) -> bool {
        (200..300).contains(&self.status())
    }
    fn is_redirection(&self) -> bool {
        (300..400).contains(&self.status())
    }
    fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
    fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status())
    }
}

/// A cheap synthetic response with no body and a no-op close.
#[derive(Debug, Clone)]
pub struct EmptyResponse {
    status: u16,
    headers: HeaderMap,
}

impl EmptyResponse {
    pub fn new(status: u16) -> Self {
        Self { status, headers: HeaderMap::new() }
    }

    pub fn with_headers(status: u16, headers: HeaderMap) -> Self {
        Self { status, headers }
    }
}

impl Response for EmptyResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn elapsed(&self) -> f64 {
        -1.0
    }

    fn read(&self) -> BoxFuture<'_, Bytes> {
        Box::pin(async { Bytes::new() })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}
