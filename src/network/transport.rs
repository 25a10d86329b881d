//! Real network transport

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use super::{HttpRequest, HttpResponse};
use crate::{ReelError, Result};

/// Performs real HTTP round-trips
pub struct Transport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl Transport {
    /// Create a new transport
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self { client }
    }

    /// Send a request over the network
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be built or the round-trip fails
    pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        if request.scheme != "http" {
            return Err(ReelError::Transport(format!(
                "Unsupported scheme '{}' for {}",
                request.scheme,
                request.url()
            )));
        }

        let uri = request
            .url()
            .parse::<Uri>()
            .map_err(|e| ReelError::InvalidRequest(format!("Invalid URI: {e}")))?;

        debug!("Sending {} {}", request.method, uri);

        let method = request.method.parse::<Method>().map_err(|e| {
            ReelError::InvalidRequest(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;

        let mut request_builder = Request::builder().method(method).uri(uri);

        for (name, value) in &request.headers {
            request_builder = request_builder.header(name, value);
        }

        let http_request = request_builder
            .body(Full::new(Bytes::copy_from_slice(&request.body)))
            .map_err(|e| ReelError::InvalidRequest(format!("Failed to build request: {e}")))?;

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Request failed: {e}");
            ReelError::Transport(format!("{} {}: {e}", request.method, request.url()))
        })?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body_bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ReelError::Transport(format!("Failed to read response body: {e}")))?
            .to_bytes();

        Ok(HttpResponse {
            status,
            headers,
            body: body_bytes.to_vec(),
        })
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}
