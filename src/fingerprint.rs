//! Request normalization and short entry fingerprints
//!
//! Matching compares normalized method, scope and path. The fingerprint is a
//! truncated SHA-256 over the same normalized fields and is only used to name
//! entries in logs and diagnostics.

use sha2::{Digest, Sha256};

/// Number of fingerprint bytes rendered in diagnostics
pub const FINGERPRINT_LEN: usize = 8;

/// Compute a short, stable fingerprint for an interaction
///
/// The fingerprint includes:
/// 1. Scope (normalized)
/// 2. Method (uppercase normalized)
/// 3. Path (normalized)
/// 4. Body (if any)
#[must_use]
pub fn fingerprint(scope: &str, method: &str, path: &str, body: Option<&[u8]>) -> String {
    let mut hasher = Sha256::new();

    for part in [
        normalize_scope(scope),
        normalize_method(method),
        normalize_path(path),
    ] {
        hasher.update((part.len() as u32).to_le_bytes());
        hasher.update(part.as_bytes());
    }

    if let Some(body) = body {
        hasher.update((body.len() as u32).to_le_bytes());
        hasher.update(body);
    }

    let digest = hasher.finalize();
    hex::encode(&digest[..FINGERPRINT_LEN])
}

/// Normalize an HTTP method
#[must_use]
pub fn normalize_method(method: &str) -> String {
    method.trim().to_uppercase()
}

/// Normalize a URL path (path plus query string)
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();

    if trimmed.is_empty() || !trimmed.starts_with('/') {
        format!("/{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Normalize a scope to `scheme://host:port`
///
/// Lowercases, strips a trailing slash and fills in the default port for
/// `http` and `https` when it is missing.
#[must_use]
pub fn normalize_scope(scope: &str) -> String {
    let lowered = scope.trim().trim_end_matches('/').to_lowercase();

    let Some((scheme, authority)) = lowered.split_once("://") else {
        return lowered;
    };

    if has_port(authority) {
        return lowered;
    }

    match default_port(scheme) {
        Some(port) => format!("{scheme}://{authority}:{port}"),
        None => lowered,
    }
}

/// Default port for a URL scheme
#[must_use]
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

fn has_port(authority: &str) -> bool {
    // IPv6 literals carry colons inside brackets
    let host_end = authority.rfind(']').map_or(0, |i| i + 1);
    authority[host_end..].contains(':')
}
