//! Network layer for Reel
//!
//! [`HttpClient`] is the boundary test code issues requests through; it
//! consults the installed hook before touching the real [`Transport`].

mod client;
mod http;
mod transport;

pub use client::HttpClient;
pub use http::{HttpRequest, HttpResponse};
pub use transport::Transport;
