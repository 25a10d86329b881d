//! Reel - deterministic HTTP record-and-replay for tests
//!
//! The first run of a test records live HTTP traffic into a cassette file;
//! later runs replay the cassette without touching the network.
//!
//! ```no_run
//! # async fn example() -> reel::Result<()> {
//! use reel::{HttpClient, HttpRecorder};
//!
//! let mut recorder = HttpRecorder::new("tests/cassettes/users.json");
//! recorder.start()?;
//! let response = HttpClient::new().get("http://127.0.0.1:3000/users").await?;
//! recorder.stop(true)?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod controller;
pub mod error;
pub mod fingerprint;
pub mod intercept;
pub mod network;
pub mod pattern;
pub mod recording;
pub mod storage;

pub use config::{RecordOptions, RecorderConfig, RepeatPolicy, ReplayOptions, SeparatorStyle};
pub use controller::{HttpRecorder, Mode};
pub use error::{ReelError, Result};
pub use network::{HttpClient, HttpRequest, HttpResponse};
pub use storage::{CassetteEntry, CassetteStore, ScopeFilter};
