//! HTTP client routed through the interception hook

use tracing::debug;

use super::{HttpRequest, HttpResponse, Transport};
use crate::intercept::{self, Hook, Interception};
use crate::Result;

/// HTTP client whose requests are subject to the installed hook
///
/// With no hook installed requests go straight to the network.
#[derive(Default)]
pub struct HttpClient {
    transport: Transport,
}

impl HttpClient {
    /// Create a new client
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: Transport::new(),
        }
    }

    /// Send a request
    ///
    /// # Errors
    ///
    /// Returns `NetworkBlocked` when replay has no match for the request, or
    /// the transport error of a real round-trip
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = request.prepared();

        match intercept::current() {
            Some(Hook::Replay(interceptor)) => match interceptor.intercept(&request)? {
                Interception::Respond(response) => Ok(response),
                Interception::Passthrough => self.transport.send(&request).await,
            },
            Some(Hook::Observe(recorder)) => {
                let response = self.transport.send(&request).await?;
                recorder.observe(&request, &response);
                Ok(response)
            }
            None => {
                debug!("No hook installed, sending {} directly", request.url());
                self.transport.send(&request).await
            }
        }
    }

    /// Send a GET request
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the request fails
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::get(url)?).await
    }

    /// Send a POST request with a body
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the request fails
    pub async fn post(&self, url: &str, body: impl Into<Vec<u8>>) -> Result<HttpResponse> {
        self.send(HttpRequest::post(url)?.body(body)).await
    }
}
