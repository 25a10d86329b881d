//! HTTP request/response values exchanged with the hook

use hyper::Uri;

use crate::fingerprint::{default_port, normalize_method, normalize_path};
use crate::{ReelError, Result};

/// Outbound HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// HTTP method (e.g., "GET", "POST")
    pub method: String,
    /// URL scheme
    pub scheme: String,
    /// Target host, without port
    pub host: String,
    /// Target port
    pub port: u16,
    /// Request path plus query string
    pub path: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Request body
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Build a request from a method and absolute URL
    ///
    /// # Errors
    ///
    /// Returns error if the URL is not absolute or has an unknown scheme
    pub fn new(method: &str, url: &str) -> Result<Self> {
        let uri = url
            .parse::<Uri>()
            .map_err(|e| ReelError::InvalidRequest(format!("Invalid URL '{url}': {e}")))?;

        let scheme = uri
            .scheme_str()
            .ok_or_else(|| ReelError::InvalidRequest(format!("URL has no scheme: {url}")))?
            .to_lowercase();
        let host = uri
            .host()
            .ok_or_else(|| ReelError::InvalidRequest(format!("URL has no host: {url}")))?
            .to_lowercase();
        let port = match uri.port_u16() {
            Some(port) => port,
            None => default_port(&scheme).ok_or_else(|| {
                ReelError::InvalidRequest(format!("Unsupported scheme '{scheme}' in {url}"))
            })?,
        };
        let path = uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());

        Ok(Self {
            method: normalize_method(method),
            scheme,
            host,
            port,
            path: normalize_path(&path),
            headers: Vec::new(),
            body: Vec::new(),
        })
    }

    /// Build a GET request
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid
    pub fn get(url: &str) -> Result<Self> {
        Self::new("GET", url)
    }

    /// Build a POST request
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid
    pub fn post(url: &str) -> Result<Self> {
        Self::new("POST", url)
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Append a URL-encoded query parameter
    #[must_use]
    pub fn query(mut self, key: &str, value: &str) -> Self {
        let separator = if self.path.contains('?') { '&' } else { '?' };
        self.path.push(separator);
        self.path.push_str(&urlencoding::encode(key));
        self.path.push('=');
        self.path.push_str(&urlencoding::encode(value));
        self
    }

    /// Set the body
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// `scheme://host:port` identifying the target server
    #[must_use]
    pub fn scope(&self) -> String {
        format!("{}://{}", self.scheme, self.authority())
    }

    /// `host:port`
    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute URL
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}{}", self.scope(), self.path)
    }

    /// First header value with the given name (case-insensitive)
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Fill in the `host` and `content-length` headers a client sends
    #[must_use]
    pub fn prepared(mut self) -> Self {
        if self.header_value("host").is_none() {
            let host = if default_port(&self.scheme) == Some(self.port) {
                self.host.clone()
            } else {
                self.authority()
            };
            self.headers.push(("host".to_string(), host));
        }

        if self.header_value("content-length").is_none() {
            self.headers
                .push(("content-length".to_string(), self.body.len().to_string()));
        }

        self
    }
}

/// HTTP response, either real or replayed from a cassette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Body decoded as UTF-8 (lossy)
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// First header value with the given name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
