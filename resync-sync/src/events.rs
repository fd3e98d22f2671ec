//! Structured run events and the sinks that receive them.
//!
//! The client never writes status lines to a global logger directly; it
//! hands each [`SyncEvent`] to the [`EventSink`] it was built with.

use std::fmt;
use std::sync::Mutex;

use resync_core::Capability;

use crate::summary::SyncSummary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Final or pre-apply status of a run.
    Status(SyncSummary),
    /// Number of change list entries to consider.
    ChangesListed(usize),
    /// A document was parsed.
    Parsed {
        kind: Capability,
        entries: usize,
        index: bool,
    },
    /// Free-form event from an embedding caller.
    Custom(String),
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::Status(summary) => fmt::Display::fmt(summary, f),
            SyncEvent::ChangesListed(n) => write!(f, "Read source change list, {n} changes listed"),
            SyncEvent::Parsed {
                kind,
                entries,
                index: false,
            } => write!(f, "Parsed {kind} document with {entries} entries"),
            SyncEvent::Parsed {
                kind,
                entries,
                index: true,
            } => write!(f, "Parsed {kind} index document with {entries} sitemaps"),
            SyncEvent::Custom(msg) => write!(f, "Event: '{msg}'"),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

/// Forwards every event to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &SyncEvent) {
        tracing::info!("{event}");
    }
}

/// Records event lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// True if any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }

    pub fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &SyncEvent) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.to_string());
    }
}
