//! Record/replay session controller
//!
//! [`HttpRecorder`] decides per session whether to record or replay: a
//! cassette file at the configured path means replay, no file means record.
//!
//! ```text
//! Idle --start (no file)----> Recording --stop--> Idle
//! Idle --start (file exists)--> Replaying --stop--> Idle
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{RecordOptions, RecorderConfig, ReplayOptions};
use crate::intercept::{self, Hook, InterceptionHandle, Interceptor};
use crate::pattern::HostPattern;
use crate::recording::Recorder;
use crate::storage::{CassetteStore, ScopeFilter};
use crate::{ReelError, Result};

/// Current session state
enum Session {
    Idle,
    Recording {
        handle: InterceptionHandle,
        recorder: Arc<Recorder>,
    },
    Replaying {
        handle: InterceptionHandle,
        interceptor: Arc<Interceptor>,
    },
}

/// Session mode, as reported by [`HttpRecorder::mode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No session running
    Idle,
    /// Capturing live traffic
    Recording,
    /// Serving from the cassette
    Replaying,
}

/// Records HTTP traffic to a cassette, or replays it if the cassette exists
///
/// Call [`start`](Self::start) before the requests under test and
/// [`stop`](Self::stop) after them. Dropping a running recorder releases the
/// hook without persisting anything.
pub struct HttpRecorder {
    path: PathBuf,
    filter: ScopeFilter,
    record_options: RecordOptions,
    replay_options: ReplayOptions,
    session: Session,
}

impl HttpRecorder {
    /// Create a recorder for the cassette at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            filter: ScopeFilter::default(),
            record_options: RecordOptions::default(),
            replay_options: ReplayOptions::default(),
            session: Session::Idle,
        }
    }

    /// Create a recorder that never persists entries for `excluded_scopes`
    #[must_use]
    pub fn with_excluded_scopes<I, S>(path: impl Into<PathBuf>, excluded_scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            filter: ScopeFilter::new(excluded_scopes),
            ..Self::new(path)
        }
    }

    /// Create a recorder from file configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn from_config(config: &RecorderConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            filter: ScopeFilter::new(&config.excluded_scopes),
            record_options: config.record.clone(),
            replay_options: config.replay.clone(),
            ..Self::new(config.cassette.clone())
        })
    }

    /// Set the options used by replay sessions
    #[must_use]
    pub fn replay_options(mut self, options: ReplayOptions) -> Self {
        self.replay_options = options;
        self
    }

    /// Start a session with the configured recording options
    ///
    /// # Errors
    ///
    /// See [`start_with`](Self::start_with)
    pub fn start(&mut self) -> Result<()> {
        let options = self.record_options.clone();
        self.start_with(options)
    }

    /// Start a session, recording with `options` if no cassette exists
    ///
    /// # Errors
    ///
    /// Returns `SessionActive` if already started, `HookBusy` if another
    /// session owns the hook, and `Parse`/`Io` if the cassette cannot be
    /// loaded
    pub fn start_with(&mut self, options: RecordOptions) -> Result<()> {
        if !matches!(self.session, Session::Idle) {
            return Err(ReelError::SessionActive(self.path.display().to_string()));
        }

        self.session = if self.is_cassette_loaded() {
            let entries = CassetteStore::load(&self.path)?;
            let interceptor = Arc::new(Interceptor::new(entries, &self.replay_options)?);
            let handle = intercept::install(Hook::Replay(Arc::clone(&interceptor)))?;

            info!(
                "Replaying {} ({} entries)",
                self.path.display(),
                interceptor.len()
            );
            Session::Replaying {
                handle,
                interceptor,
            }
        } else {
            let recorder = Arc::new(Recorder::new(options));
            let handle = intercept::install(Hook::Observe(Arc::clone(&recorder)))?;

            info!("Recording {}", self.path.display());
            Session::Recording { handle, recorder }
        };

        Ok(())
    }

    /// End the session
    ///
    /// Recording sessions persist their filtered entries. Replay sessions
    /// check that every entry was used when `verify_complete` is set. The hook
    /// is released before any error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Completion` if verification finds unused entries and
    /// `FileSystem` if the cassette cannot be written
    pub fn stop(&mut self, verify_complete: bool) -> Result<()> {
        match std::mem::replace(&mut self.session, Session::Idle) {
            Session::Idle => {
                debug!("stop() called with no active session");
                Ok(())
            }
            Session::Recording { handle, recorder } => {
                handle.uninstall();

                if self.is_cassette_loaded() {
                    warn!(
                        "Cassette {} appeared during recording, replacing it",
                        self.path.display()
                    );
                }

                let entries = self.filter.apply(recorder.take());
                CassetteStore::persist(&self.path, &entries)
            }
            Session::Replaying {
                handle,
                interceptor,
            } => {
                let unmatched = interceptor.pending();
                handle.uninstall();

                info!("Stopped replaying {}", self.path.display());

                if verify_complete && !unmatched.is_empty() {
                    return Err(ReelError::Completion { unmatched });
                }
                Ok(())
            }
        }
    }

    /// Let requests to hosts matching `pattern` reach the network during
    /// replay; `None` allows every host
    ///
    /// Outside replay this has no effect.
    ///
    /// # Errors
    ///
    /// Returns error if `pattern` is an invalid regex
    pub fn enable_net_connect(&self, pattern: Option<&str>) -> Result<()> {
        let pattern = match pattern {
            Some(p) => HostPattern::parse(p)?,
            None => HostPattern::Any,
        };
        self.allow(pattern);
        Ok(())
    }

    /// Add a compiled passthrough rule during replay
    pub fn allow(&self, pattern: HostPattern) {
        match &self.session {
            Session::Replaying { interceptor, .. } => interceptor.allow(pattern),
            Session::Recording { .. } | Session::Idle => {
                debug!("Ignoring passthrough rule {pattern:?} outside replay");
            }
        }
    }

    /// Whether a cassette file exists at the configured path right now
    #[must_use]
    pub fn is_cassette_loaded(&self) -> bool {
        CassetteStore::exists(&self.path)
    }

    /// Whether a replay hook is currently installed by this recorder
    #[must_use]
    pub fn is_active(&self) -> bool {
        match &self.session {
            Session::Replaying { handle, .. } => handle.is_current(),
            Session::Recording { .. } | Session::Idle => false,
        }
    }

    /// Current session mode
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self.session {
            Session::Idle => Mode::Idle,
            Session::Recording { .. } => Mode::Recording,
            Session::Replaying { .. } => Mode::Replaying,
        }
    }

    /// Replay entries not used so far; empty outside replay
    #[must_use]
    pub fn pending(&self) -> Vec<String> {
        match &self.session {
            Session::Replaying { interceptor, .. } => interceptor.pending(),
            Session::Recording { .. } | Session::Idle => Vec::new(),
        }
    }

    /// Entries captured so far in a recording session
    #[must_use]
    pub fn recorded_count(&self) -> usize {
        match &self.session {
            Session::Recording { recorder, .. } => recorder.len(),
            Session::Replaying { .. } | Session::Idle => 0,
        }
    }

    /// Cassette path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::test_lock;
    use crate::network::HttpClient;
    use crate::storage::CassetteEntry;
    use serde_json::json;
    use tempfile::TempDir;

    fn canned(path: &str) -> CassetteEntry {
        CassetteEntry {
            scope: "http://cassette.invalid:80".to_string(),
            method: "GET".to_string(),
            path: path.to_string(),
            body: None,
            reqheaders: None,
            status: 200,
            response: json!("canned"),
            response_is_binary: false,
            response_headers: vec![],
        }
    }

    #[test]
    fn test_path_and_initial_state() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cassette.json");
        let recorder = HttpRecorder::new(&path);

        assert_eq!(recorder.path(), path);
        assert!(!recorder.is_cassette_loaded());
        assert!(!recorder.is_active());
        assert_eq!(recorder.mode(), Mode::Idle);
    }

    #[test]
    fn test_empty_recording_creates_empty_cassette() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cassette.json");
        let mut recorder = HttpRecorder::new(&path);

        recorder.start().unwrap();
        assert_eq!(recorder.mode(), Mode::Recording);
        assert!(!recorder.is_active());
        recorder.stop(false).unwrap();

        assert!(recorder.is_cassette_loaded());
        assert!(CassetteStore::load(&path).unwrap().is_empty());

        recorder.start().unwrap();
        assert_eq!(recorder.mode(), Mode::Replaying);
        assert!(recorder.is_active());
        recorder.stop(true).unwrap();
        assert!(!recorder.is_active());
    }

    #[test]
    fn test_double_start_is_rejected() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = HttpRecorder::new(temp_dir.path().join("c.json"));

        recorder.start().unwrap();
        assert!(matches!(recorder.start(), Err(ReelError::SessionActive(_))));
        recorder.stop(false).unwrap();
    }

    #[test]
    fn test_second_recorder_cannot_take_hook() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let mut first = HttpRecorder::new(temp_dir.path().join("a.json"));
        let mut second = HttpRecorder::new(temp_dir.path().join("b.json"));

        first.start().unwrap();
        assert!(matches!(second.start(), Err(ReelError::HookBusy)));
        assert_eq!(second.mode(), Mode::Idle);
        first.stop(false).unwrap();

        second.start().unwrap();
        second.stop(false).unwrap();
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut recorder = HttpRecorder::new(temp_dir.path().join("c.json"));

        recorder.stop(true).unwrap();
        assert!(!recorder.is_cassette_loaded());
    }

    #[test]
    fn test_malformed_cassette_fails_start() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let mut recorder = HttpRecorder::new(&path);

        assert!(matches!(recorder.start(), Err(ReelError::Parse { .. })));
        assert_eq!(recorder.mode(), Mode::Idle);
        assert!(!intercept::is_installed());
    }

    #[test]
    fn test_drop_releases_hook() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.json");

        {
            let mut recorder = HttpRecorder::new(&path);
            recorder.start().unwrap();
            assert!(intercept::is_installed());
        }

        assert!(!intercept::is_installed());
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_persist_still_releases_hook() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();
        let mut recorder = HttpRecorder::new(blocker.join("c.json"));

        recorder.start().unwrap();
        assert!(intercept::is_installed());

        let result = recorder.stop(false);

        assert!(matches!(result, Err(ReelError::FileSystem { .. })));
        assert!(!intercept::is_installed());
        assert_eq!(recorder.mode(), Mode::Idle);
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "file");
    }

    #[tokio::test]
    async fn test_verify_complete_reports_unmatched() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.json");
        CassetteStore::persist(&path, &[canned("/used"), canned("/unused")]).unwrap();

        let mut recorder = HttpRecorder::new(&path);
        recorder.start().unwrap();
        HttpClient::new()
            .get("http://cassette.invalid/used")
            .await
            .unwrap();
        assert_eq!(
            recorder.pending(),
            vec!["http://cassette.invalid:80 GET /unused".to_string()]
        );

        match recorder.stop(true) {
            Err(ReelError::Completion { unmatched }) => {
                assert_eq!(unmatched, vec!["http://cassette.invalid:80 GET /unused".to_string()]);
            }
            other => panic!("expected Completion, got {other:?}"),
        }

        assert!(!recorder.is_active());
        assert!(!intercept::is_installed());
    }

    #[test]
    fn test_stop_without_verify_ignores_unmatched() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.json");
        CassetteStore::persist(&path, &[canned("/unused")]).unwrap();

        let mut recorder = HttpRecorder::new(&path);
        recorder.start().unwrap();
        recorder.stop(false).unwrap();

        recorder.start().unwrap();
        recorder.stop(false).unwrap();
    }

    #[test]
    fn test_enable_net_connect_ignored_outside_replay() {
        let _lock = test_lock();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("c.json");
        let mut recorder = HttpRecorder::new(&path);

        recorder.enable_net_connect(Some("127.0.0.1")).unwrap();
        recorder.start().unwrap();
        recorder.enable_net_connect(None).unwrap();
        recorder.stop(false).unwrap();

        assert!(CassetteStore::load(&path).unwrap().is_empty());
        assert!(recorder.enable_net_connect(Some("~(")).is_err());
    }

    #[test]
    fn test_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config: RecorderConfig = toml::from_str(&format!(
            "cassette = {:?}\nexcluded_scopes = [\"http://a:1\"]\n",
            temp_dir.path().join("c.json").display().to_string()
        ))
        .unwrap();

        let recorder = HttpRecorder::from_config(&config).unwrap();
        assert_eq!(recorder.path(), temp_dir.path().join("c.json"));
        assert_eq!(recorder.filter.excluded(), ["http://a:1".to_string()]);
    }
}
