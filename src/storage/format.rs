//! Cassette document format
//!
//! A cassette is a JSON array of entries. Field order is fixed by the struct
//! so equivalent recordings serialize identically.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RecordOptions;
use crate::fingerprint::{fingerprint, normalize_method, normalize_path};
use crate::network::{HttpRequest, HttpResponse};

/// Value written in place of redacted header values
pub const REDACTED: &str = "[REDACTED]";

/// Response headers recomputed on replay
const FRAMING_HEADERS: [&str; 2] = ["content-length", "transfer-encoding"];

/// One recorded request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CassetteEntry {
    /// `scheme://host:port` of the server
    pub scope: String,
    /// HTTP method
    pub method: String,
    /// Request path plus query string
    pub path: String,
    /// Request body matcher; absent matches any body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Captured request headers (header capture only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reqheaders: Option<BTreeMap<String, String>>,
    /// Response status code
    pub status: u16,
    /// Response body
    #[serde(default)]
    pub response: Value,
    /// `response` holds hex-encoded bytes
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub response_is_binary: bool,
    /// Response headers in received order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_headers: Vec<(String, String)>,
}

impl CassetteEntry {
    /// Build an entry from an observed exchange
    #[must_use]
    pub fn from_exchange(
        request: &HttpRequest,
        response: &HttpResponse,
        options: &RecordOptions,
    ) -> Self {
        let reqheaders = options
            .header_capture
            .then(|| capture_headers(&request.headers, &options.redact_headers));

        let (response_body, response_is_binary) = encode_response(&response.body);

        Self {
            scope: request.scope(),
            method: normalize_method(&request.method),
            path: normalize_path(&request.path),
            body: encode_request_body(&request.body),
            reqheaders,
            status: response.status,
            response: response_body,
            response_is_binary,
            response_headers: response.headers.clone(),
        }
    }

    /// Short identifier used in logs
    #[must_use]
    pub fn id(&self) -> String {
        let body = self.body.as_ref().map(Value::to_string);
        fingerprint(
            &self.scope,
            &self.method,
            &self.path,
            body.as_deref().map(str::as_bytes),
        )
    }

    /// `scope method path` description for diagnostics
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} {} {}", self.scope, self.method, self.path)
    }

    /// Decode the canned response
    ///
    /// Framing headers are recomputed from the decoded body.
    ///
    /// # Errors
    ///
    /// Returns error if a binary body is not valid hex
    pub fn to_response(&self) -> Result<HttpResponse, hex::FromHexError> {
        let body = decode_response(&self.response, self.response_is_binary)?;

        let mut headers: Vec<(String, String)> = self
            .response_headers
            .iter()
            .filter(|(name, _)| {
                !FRAMING_HEADERS
                    .iter()
                    .any(|framing| name.eq_ignore_ascii_case(framing))
            })
            .cloned()
            .collect();
        headers.push(("content-length".to_string(), body.len().to_string()));

        Ok(HttpResponse {
            status: self.status,
            headers,
            body,
        })
    }
}

/// Lowercase header names and mask redacted values
fn capture_headers(headers: &[(String, String)], redact: &[String]) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = name.to_lowercase();
            let value = if redact.iter().any(|r| r.eq_ignore_ascii_case(&name)) {
                REDACTED.to_string()
            } else {
                value.clone()
            };
            (name, value)
        })
        .collect()
}

/// Request bodies: JSON documents stay structured, anything else is text
fn encode_request_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => Some(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

/// Response bodies stay structured only when re-serializing reproduces the
/// received bytes exactly
fn encode_response(body: &[u8]) -> (Value, bool) {
    if let Ok(value @ (Value::Object(_) | Value::Array(_))) = serde_json::from_slice::<Value>(body)
    {
        if serde_json::to_vec(&value).is_ok_and(|rendered| rendered == body) {
            return (value, false);
        }
    }

    match std::str::from_utf8(body) {
        Ok(text) => (Value::String(text.to_string()), false),
        Err(_) => (Value::String(hex::encode(body)), true),
    }
}

fn decode_response(value: &Value, binary: bool) -> Result<Vec<u8>, hex::FromHexError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) if binary => hex::decode(text),
        Value::String(text) => Ok(text.as_bytes().to_vec()),
        other => Ok(other.to_string().into_bytes()),
    }
}
