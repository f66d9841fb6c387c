//! Shared ordered event recording.

use std::sync::{Arc, Mutex, PoisonError};

/// An append-only log shared by every fake in a test.
///
/// Because all fakes write to the same log, entries carry the global order
/// in which side effects happened, across ports.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    /// Fresh empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry.
    pub fn record(&self, entry: impl Into<String>) {
        let entry = entry.into();
        tracing::debug!(%entry, "harness event");
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Entries matching a prefix, in order.
    pub fn entries_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries().into_iter().filter(|e| e.starts_with(prefix)).collect()
    }

    /// Position of the first entry equal to `needle`.
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == needle)
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
