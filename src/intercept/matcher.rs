//! Replay matching against loaded cassette entries

use std::sync::{Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::config::{RepeatPolicy, ReplayOptions};
use crate::fingerprint::normalize_path;
use crate::network::{HttpRequest, HttpResponse};
use crate::pattern::{BodyMatcher, HostPattern};
use crate::storage::{CassetteEntry, REDACTED};
use crate::{ReelError, Result};

/// Outcome of intercepting a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Serve this canned response
    Respond(HttpResponse),
    /// Send the request to the real network
    Passthrough,
}

struct LoadedEntry {
    id: String,
    description: String,
    method: String,
    path: String,
    scope: HostPattern,
    body: Option<BodyMatcher>,
    headers: Vec<(String, String)>,
    response: HttpResponse,
}

impl LoadedEntry {
    fn load(entry: &CassetteEntry) -> Result<Self> {
        let response = entry.to_response().map_err(|e| {
            ReelError::InvalidRequest(format!("{}: invalid binary body: {e}", entry.describe()))
        })?;

        Ok(Self {
            id: entry.id(),
            description: entry.describe(),
            method: entry.method.to_uppercase(),
            path: normalize_path(&entry.path),
            scope: HostPattern::parse(&entry.scope)?,
            body: entry.body.as_ref().map(BodyMatcher::from_value).transpose()?,
            headers: entry
                .reqheaders
                .iter()
                .flatten()
                .map(|(n, v)| (n.clone(), v.clone()))
                .collect(),
            response,
        })
    }

    fn matches(&self, request: &HttpRequest, match_headers: bool) -> bool {
        self.method.eq_ignore_ascii_case(&request.method)
            && self.path == request.path
            && self.scope.matches(request)
            && self.body.as_ref().map_or(true, |m| m.matches(&request.body))
            && (!match_headers || self.headers_match(request))
    }

    fn headers_match(&self, request: &HttpRequest) -> bool {
        self.headers.iter().all(|(name, expected)| {
            request
                .header_value(name)
                .is_some_and(|actual| expected == REDACTED || actual == expected)
        })
    }
}

/// Serves replayed responses and tracks how often each entry was used
pub struct Interceptor {
    entries: Vec<LoadedEntry>,
    match_counts: Mutex<Vec<usize>>,
    passthrough: RwLock<Vec<HostPattern>>,
    repeat: RepeatPolicy,
    match_headers: bool,
}

impl Interceptor {
    /// Create an interceptor over loaded entries
    ///
    /// # Errors
    ///
    /// Returns error if an entry carries an invalid pattern or body
    pub fn new(entries: Vec<CassetteEntry>, options: &ReplayOptions) -> Result<Self> {
        let loaded = entries
            .iter()
            .map(LoadedEntry::load)
            .collect::<Result<Vec<_>>>()?;

        info!("Replay interceptor loaded {} entries", loaded.len());

        Ok(Self {
            match_counts: Mutex::new(vec![0; loaded.len()]),
            entries: loaded,
            passthrough: RwLock::new(options.passthrough()?),
            repeat: options.repeat,
            match_headers: options.match_request_headers,
        })
    }

    /// Allow requests to hosts matching `pattern` through to the network
    pub fn allow(&self, pattern: HostPattern) {
        debug!("Passthrough enabled for {pattern:?}");
        self.passthrough
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pattern);
    }

    /// Decide how to handle an outbound request
    ///
    /// # Errors
    ///
    /// Returns `NetworkBlocked` if no passthrough rule or entry matches
    pub fn intercept(&self, request: &HttpRequest) -> Result<Interception> {
        let allowed = self
            .passthrough
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|pattern| pattern.matches(request));

        if allowed {
            debug!("Passthrough: {} {}", request.method, request.url());
            return Ok(Interception::Passthrough);
        }

        let mut counts = self
            .match_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let found = self.entries.iter().enumerate().find(|(i, entry)| {
            self.repeat.allows(counts[*i]) && entry.matches(request, self.match_headers)
        });

        if let Some((i, entry)) = found {
            counts[i] += 1;
            debug!(
                "Replayed {} {} from entry {} (uses: {})",
                request.method,
                request.url(),
                entry.id,
                counts[i]
            );
            return Ok(Interception::Respond(entry.response.clone()));
        }

        let pending = self.pending_in(&counts);
        drop(counts);

        warn!(
            "Blocked {} {}: no matching cassette entry",
            request.method,
            request.url()
        );

        Err(ReelError::NetworkBlocked {
            method: request.method.clone(),
            url: request.url(),
            pending,
        })
    }

    /// Number of times each entry has served a request, in cassette order
    #[must_use]
    pub fn match_counts(&self) -> Vec<usize> {
        self.match_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries that have not served any request yet
    #[must_use]
    pub fn pending(&self) -> Vec<String> {
        let counts = self
            .match_counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.pending_in(&counts)
    }

    /// Whether every entry served at least one request
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.pending().is_empty()
    }

    /// Number of loaded entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn pending_in(&self, counts: &[usize]) -> Vec<String> {
        self.entries
            .iter()
            .zip(counts)
            .filter(|(_, count)| **count == 0)
            .map(|(entry, _)| entry.description.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn entry(path: &str, response: &str) -> CassetteEntry {
        CassetteEntry {
            scope: "http://127.0.0.1:3000".to_string(),
            method: "GET".to_string(),
            path: path.to_string(),
            body: None,
            reqheaders: None,
            status: 200,
            response: json!(response),
            response_is_binary: false,
            response_headers: vec![("content-type".to_string(), "text/plain".to_string())],
        }
    }

    fn get(url: &str) -> HttpRequest {
        HttpRequest::get(url).unwrap().prepared()
    }

    fn body_of(interception: Interception) -> String {
        match interception {
            Interception::Respond(response) => response.text(),
            Interception::Passthrough => panic!("expected a canned response"),
        }
    }

    #[test]
    fn test_replays_matching_entry() {
        let interceptor =
            Interceptor::new(vec![entry("/", "result_ok")], &ReplayOptions::default()).unwrap();

        let result = interceptor.intercept(&get("http://127.0.0.1:3000/")).unwrap();

        assert_eq!(body_of(result), "result_ok");
        assert_eq!(interceptor.match_counts(), vec![1]);
        assert!(interceptor.is_done());
    }

    #[test]
    fn test_method_scope_and_path_must_match() {
        let interceptor =
            Interceptor::new(vec![entry("/", "ok")], &ReplayOptions::default()).unwrap();

        assert!(interceptor.intercept(&get("http://127.0.0.1:3000/other")).is_err());
        assert!(interceptor.intercept(&get("http://127.0.0.1:4000/")).is_err());
        let post = HttpRequest::post("http://127.0.0.1:3000/").unwrap();
        assert!(interceptor.intercept(&post).is_err());
        assert_eq!(interceptor.match_counts(), vec![0]);
    }

    #[test]
    fn test_blocked_error_lists_pending() {
        let interceptor = Interceptor::new(
            vec![entry("/a", "a"), entry("/b", "b")],
            &ReplayOptions::default(),
        )
        .unwrap();
        interceptor.intercept(&get("http://127.0.0.1:3000/a")).unwrap();

        match interceptor.intercept(&get("http://example.org/")) {
            Err(ReelError::NetworkBlocked { method, url, pending }) => {
                assert_eq!(method, "GET");
                assert_eq!(url, "http://example.org:80/");
                assert_eq!(pending, vec!["http://127.0.0.1:3000 GET /b".to_string()]);
            }
            other => panic!("expected NetworkBlocked, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_cassette_blocks_everything() {
        let interceptor = Interceptor::new(Vec::new(), &ReplayOptions::default()).unwrap();

        assert!(interceptor.is_empty());
        assert!(interceptor.is_done());
        assert!(matches!(
            interceptor.intercept(&get("http://example.org/")),
            Err(ReelError::NetworkBlocked { .. })
        ));
    }

    #[test]
    fn test_passthrough_rules() {
        let interceptor = Interceptor::new(Vec::new(), &ReplayOptions::default()).unwrap();
        interceptor.allow(HostPattern::parse("127.0.0.1").unwrap());

        assert_eq!(
            interceptor.intercept(&get("http://127.0.0.1:3000/")).unwrap(),
            Interception::Passthrough
        );
        assert!(interceptor.intercept(&get("http://example.org/")).is_err());

        interceptor.allow(HostPattern::Any);
        assert_eq!(
            interceptor.intercept(&get("http://example.org/")).unwrap(),
            Interception::Passthrough
        );
    }

    #[test]
    fn test_passthrough_from_options() {
        let options = ReplayOptions {
            allow_hosts: vec!["~^localhost".to_string()],
            ..ReplayOptions::default()
        };
        let interceptor = Interceptor::new(Vec::new(), &options).unwrap();

        assert_eq!(
            interceptor.intercept(&get("http://localhost:8080/")).unwrap(),
            Interception::Passthrough
        );
    }

    #[test]
    fn test_unlimited_repeats_use_first_entry() {
        let interceptor = Interceptor::new(
            vec![entry("/", "first"), entry("/", "second")],
            &ReplayOptions::default(),
        )
        .unwrap();

        for _ in 0..3 {
            let result = interceptor.intercept(&get("http://127.0.0.1:3000/")).unwrap();
            assert_eq!(body_of(result), "first");
        }

        assert_eq!(interceptor.match_counts(), vec![3, 0]);
        assert!(!interceptor.is_done());
    }

    #[test]
    fn test_limited_repeats_advance_through_entries() {
        let options = ReplayOptions {
            repeat: RepeatPolicy::Times(1),
            ..ReplayOptions::default()
        };
        let interceptor =
            Interceptor::new(vec![entry("/", "first"), entry("/", "second")], &options).unwrap();
        let request = get("http://127.0.0.1:3000/");

        assert_eq!(body_of(interceptor.intercept(&request).unwrap()), "first");
        assert_eq!(body_of(interceptor.intercept(&request).unwrap()), "second");
        assert!(interceptor.intercept(&request).is_err());
        assert!(interceptor.is_done());
    }

    #[test]
    fn test_body_matcher() {
        let mut with_body = entry("/items", "created");
        with_body.method = "POST".to_string();
        with_body.body = Some(json!({"name": "widget"}));
        let interceptor = Interceptor::new(vec![with_body], &ReplayOptions::default()).unwrap();

        let matching = HttpRequest::post("http://127.0.0.1:3000/items")
            .unwrap()
            .body(r#"{ "name": "widget" }"#);
        let other = HttpRequest::post("http://127.0.0.1:3000/items")
            .unwrap()
            .body(r#"{"name": "gadget"}"#);

        assert!(interceptor.intercept(&other).is_err());
        assert_eq!(body_of(interceptor.intercept(&matching).unwrap()), "created");
    }

    #[test]
    fn test_recorded_headers_ignored_by_default() {
        let mut with_headers = entry("/", "ok");
        with_headers.reqheaders = Some(BTreeMap::from([(
            "x-trace".to_string(),
            "abc".to_string(),
        )]));
        let interceptor = Interceptor::new(vec![with_headers], &ReplayOptions::default()).unwrap();

        assert!(interceptor.intercept(&get("http://127.0.0.1:3000/")).is_ok());
    }

    #[test]
    fn test_recorded_headers_matched_when_configured() {
        let mut with_headers = entry("/", "ok");
        with_headers.reqheaders = Some(BTreeMap::from([
            ("x-trace".to_string(), "abc".to_string()),
            ("authorization".to_string(), REDACTED.to_string()),
        ]));
        let options = ReplayOptions {
            match_request_headers: true,
            ..ReplayOptions::default()
        };
        let interceptor = Interceptor::new(vec![with_headers], &options).unwrap();

        let missing = get("http://127.0.0.1:3000/");
        let present = HttpRequest::get("http://127.0.0.1:3000/")
            .unwrap()
            .header("X-Trace", "abc")
            .header("Authorization", "Bearer anything");

        assert!(interceptor.intercept(&missing).is_err());
        assert!(interceptor.intercept(&present).is_ok());
    }

    #[test]
    fn test_regex_entry_scope() {
        let mut regex_scope = entry("/", "ok");
        regex_scope.scope = r"~^api\d\.example\.org".to_string();
        let interceptor = Interceptor::new(vec![regex_scope], &ReplayOptions::default()).unwrap();

        assert!(interceptor.intercept(&get("http://api1.example.org/")).is_ok());
        assert!(interceptor.intercept(&get("http://www.example.org/")).is_err());
    }

    #[test]
    fn test_replayed_response_keeps_status_and_headers() {
        let mut created = entry("/", "made");
        created.status = 201;
        let interceptor = Interceptor::new(vec![created], &ReplayOptions::default()).unwrap();

        match interceptor.intercept(&get("http://127.0.0.1:3000/")).unwrap() {
            Interception::Respond(response) => {
                assert_eq!(response.status, 201);
                assert_eq!(response.header("content-type"), Some("text/plain"));
                assert_eq!(response.header("content-length"), Some("4"));
            }
            Interception::Passthrough => panic!("expected a canned response"),
        }
    }

    proptest! {
        #[test]
        fn prop_single_use_entries_serve_at_most_once(
            recorded in proptest::collection::vec(0u8..4, 0..16),
            requested in proptest::collection::vec(0u8..4, 0..32),
        ) {
            let entries: Vec<CassetteEntry> = recorded
                .iter()
                .map(|n| entry(&format!("/{n}"), "ok"))
                .collect();
            let options = ReplayOptions {
                repeat: RepeatPolicy::Times(1),
                ..ReplayOptions::default()
            };
            let interceptor = Interceptor::new(entries, &options).unwrap();

            let served = requested
                .iter()
                .filter(|n| {
                    interceptor
                        .intercept(&get(&format!("http://127.0.0.1:3000/{n}")))
                        .is_ok()
                })
                .count();

            let counts = interceptor.match_counts();
            prop_assert!(served <= recorded.len());
            prop_assert!(counts.iter().all(|c| *c <= 1));
            prop_assert_eq!(counts.iter().sum::<usize>(), served);

            for n in 0u8..4 {
                let available = recorded.iter().filter(|r| **r == n).count();
                let asked = requested.iter().filter(|r| **r == n).count();
                let used: usize = recorded
                    .iter()
                    .zip(&counts)
                    .filter(|(r, _)| **r == n)
                    .map(|(_, c)| *c)
                    .sum();
                prop_assert_eq!(used, available.min(asked));
            }
        }
    }
}
