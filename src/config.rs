//! Configuration types for Reel

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pattern::HostPattern;
use crate::{ReelError, Result};

/// How captured entries are framed when printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeparatorStyle {
    /// Print entries as-is
    #[default]
    None,
    /// Wrap each printed entry in cut-here markers
    Cut,
}

/// Options for a recording session
///
/// These only shape recorded entries and their log output; replay ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordOptions {
    /// Store request headers on each entry
    pub header_capture: bool,
    /// Framing used when entries are printed
    pub separator_style: SeparatorStyle,
    /// Suppress printing of captured entries
    pub quiet: bool,
    /// Header names whose captured values are masked
    pub redact_headers: Vec<String>,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            header_capture: false,
            separator_style: SeparatorStyle::None,
            quiet: true,
            redact_headers: vec![
                "authorization".to_string(),
                "cookie".to_string(),
                "proxy-authorization".to_string(),
            ],
        }
    }
}

impl RecordOptions {
    /// Enable or disable request header capture
    #[must_use]
    pub fn header_capture(mut self, enabled: bool) -> Self {
        self.header_capture = enabled;
        self
    }

    /// Set the separator style for printed entries
    #[must_use]
    pub fn separator_style(mut self, style: SeparatorStyle) -> Self {
        self.separator_style = style;
        self
    }

    /// Enable or disable printing of captured entries
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }
}

/// How many requests a single cassette entry may serve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatPolicy {
    /// An entry serves any number of requests
    #[default]
    Unlimited,
    /// An entry serves at most this many requests, then is skipped
    Times(usize),
}

impl RepeatPolicy {
    /// Whether an entry matched `count` times can serve another request
    #[must_use]
    pub fn allows(self, count: usize) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Times(limit) => count < limit,
        }
    }
}

/// Options for a replay session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayOptions {
    /// Entry repeat policy
    pub repeat: RepeatPolicy,
    /// Require recorded `reqheaders` to match the outgoing request
    pub match_request_headers: bool,
    /// Passthrough rules installed when replay starts
    pub allow_hosts: Vec<String>,
}

impl ReplayOptions {
    /// Compile `allow_hosts` into host patterns
    ///
    /// # Errors
    ///
    /// Returns error if a regex pattern does not compile
    pub fn passthrough(&self) -> Result<Vec<HostPattern>> {
        self.allow_hosts.iter().map(|p| HostPattern::parse(p)).collect()
    }
}

/// File-based configuration for a recorder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Cassette path
    pub cassette: PathBuf,
    /// Scopes never written to the cassette
    #[serde(default)]
    pub excluded_scopes: Vec<String>,
    /// Recording options
    #[serde(default)]
    pub record: RecordOptions,
    /// Replay options
    #[serde(default)]
    pub replay: ReplayOptions,
}

impl RecorderConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReelError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ReelError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.cassette.as_os_str().is_empty() {
            return Err(ReelError::ConfigError(
                "cassette path cannot be empty".to_string(),
            ));
        }

        if let Some(parent) = self.cassette.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ReelError::ConfigError(format!(
                    "Cassette directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        for (i, scope) in self.excluded_scopes.iter().enumerate() {
            if scope.trim().is_empty() {
                return Err(ReelError::ConfigError(format!(
                    "excluded_scopes[{i}] cannot be empty"
                )));
            }
        }

        if self.replay.repeat == RepeatPolicy::Times(0) {
            return Err(ReelError::ConfigError(
                "replay.repeat times must be > 0".to_string(),
            ));
        }

        self.replay
            .passthrough()
            .map_err(|e| ReelError::ConfigError(format!("replay.allow_hosts: {e}")))?;

        Ok(())
    }
}
