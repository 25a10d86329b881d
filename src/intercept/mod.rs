//! Request interception for replay sessions
//!
//! The hook slot is process-wide and holds at most one owner. In replay the
//! installed [`Interceptor`] answers requests from the cassette; in recording
//! the slot holds a passive observer.

mod hook;
mod matcher;

pub use hook::{current, install, is_installed, Hook, InterceptionHandle};
pub use matcher::{Interception, Interceptor};

#[cfg(test)]
pub(crate) use hook::test_lock;
