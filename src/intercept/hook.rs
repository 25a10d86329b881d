//! Process-wide interception slot
//!
//! At most one hook is installed per process. Installing returns an
//! [`InterceptionHandle`]; the hook stays in place until that handle is
//! uninstalled or dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::Interceptor;
use crate::recording::Recorder;
use crate::{ReelError, Result};

/// What the installed hook does with outbound requests
#[derive(Clone)]
pub enum Hook {
    /// Serve requests from a cassette
    Replay(Arc<Interceptor>),
    /// Let requests through and record each exchange
    Observe(Arc<Recorder>),
}

impl Hook {
    fn kind(&self) -> &'static str {
        match self {
            Self::Replay(_) => "replay",
            Self::Observe(_) => "observe",
        }
    }
}

struct Installed {
    id: u64,
    hook: Hook,
}

static SLOT: RwLock<Option<Installed>> = RwLock::new(None);
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Install `hook` as the process-wide hook
///
/// # Errors
///
/// Returns `HookBusy` if another handle currently owns the slot
pub fn install(hook: Hook) -> Result<InterceptionHandle> {
    let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);

    if slot.is_some() {
        return Err(ReelError::HookBusy);
    }

    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    debug!("Installing {} hook #{id}", hook.kind());
    *slot = Some(Installed { id, hook });

    Ok(InterceptionHandle { id, released: false })
}

/// The currently installed hook, if any
#[must_use]
pub fn current() -> Option<Hook> {
    SLOT.read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|installed| installed.hook.clone())
}

/// Whether any hook is installed
#[must_use]
pub fn is_installed() -> bool {
    SLOT.read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// Ownership of the installed hook
///
/// Dropping the handle uninstalls the hook.
#[derive(Debug)]
pub struct InterceptionHandle {
    id: u64,
    released: bool,
}

impl InterceptionHandle {
    /// Whether this handle still owns the slot
    #[must_use]
    pub fn is_current(&self) -> bool {
        !self.released
            && SLOT
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
                .is_some_and(|installed| installed.id == self.id)
    }

    /// Remove the hook, restoring direct network access
    pub fn uninstall(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut slot = SLOT.write().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|installed| installed.id == self.id) {
            debug!("Uninstalling hook #{}", self.id);
            *slot = None;
        }
    }
}

impl Drop for InterceptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Serializes tests that touch the process-wide slot
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}
