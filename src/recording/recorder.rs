//! Passive recorder for live traffic

use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::config::{RecordOptions, SeparatorStyle};
use crate::network::{HttpRequest, HttpResponse};
use crate::storage::CassetteEntry;

use super::{CUT_BEGIN, CUT_END};

/// Buffers observed exchanges as cassette entries
///
/// The recorder never alters a request or response; it only copies them.
pub struct Recorder {
    options: RecordOptions,
    entries: Mutex<Vec<CassetteEntry>>,
}

impl Recorder {
    /// Create a recorder with the given options
    #[must_use]
    pub fn new(options: RecordOptions) -> Self {
        Self {
            options,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Record one completed exchange
    pub fn observe(&self, request: &HttpRequest, response: &HttpResponse) {
        let entry = CassetteEntry::from_exchange(request, response, &self.options);

        if !self.options.quiet {
            self.print(&entry);
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push(entry);

        debug!(
            "Recorded {} {} -> {} (count: {})",
            request.method,
            request.url(),
            response.status,
            entries.len()
        );
    }

    /// Number of buffered entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered entries in capture order
    #[must_use]
    pub fn entries(&self) -> Vec<CassetteEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the buffered entries in capture order
    #[must_use]
    pub fn take(&self) -> Vec<CassetteEntry> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn print(&self, entry: &CassetteEntry) {
        let rendered = match serde_json::to_string_pretty(entry) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("Failed to render recorded entry {}: {e}", entry.describe());
                return;
            }
        };

        match self.options.separator_style {
            SeparatorStyle::None => info!("\n{rendered}"),
            SeparatorStyle::Cut => info!("\n{CUT_BEGIN}\n{rendered}\n{CUT_END}"),
        }
    }
}
