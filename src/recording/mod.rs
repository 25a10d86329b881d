//! Passive capture of live traffic during recording sessions

mod recorder;

pub use recorder::Recorder;

/// Opening marker for printed entries
pub const CUT_BEGIN: &str = "<<<<<<-- cut here -->>>>>>";

/// Closing marker for printed entries
pub const CUT_END: &str = "<<<<<<-- cut here -->>>>>>";
