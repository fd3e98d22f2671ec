//! Run summaries and their status lines.

use std::fmt;

use crate::diff::Delta;
use crate::error::TransferFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Audit,
    Baseline,
    Incremental,
}

/// Counts for one audit, baseline or incremental run.
///
/// For an audit the counts are what *would* change; for a baseline or an
/// incremental run they are what did change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub mode: SyncMode,
    pub same: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Destination-only resources left in place because deletion is off.
    pub not_deleted: usize,
    /// Change list entries at or after the start datetime.
    pub changes_listed: usize,
    pub failures: Vec<TransferFailure>,
}

impl SyncSummary {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            same: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            not_deleted: 0,
            changes_listed: 0,
            failures: Vec::new(),
        }
    }

    /// What a diff would do, without doing it.
    pub fn audit(delta: &Delta) -> Self {
        Self {
            same: delta.same.len(),
            created: delta.created.len(),
            updated: delta.updated.len(),
            deleted: delta.deleted.len(),
            ..Self::new(SyncMode::Audit)
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Nothing left to do and nothing went wrong.
    pub fn in_sync(&self) -> bool {
        match self.mode {
            SyncMode::Audit => self.created + self.updated + self.deleted == 0,
            SyncMode::Baseline | SyncMode::Incremental => {
                self.failures.is_empty() && self.not_deleted == 0
            }
        }
    }

    pub fn status_word(&self) -> &'static str {
        match (self.mode, self.in_sync()) {
            (SyncMode::Audit, true) => "IN SYNC",
            (SyncMode::Audit, false) => "NOT IN SYNC",
            (SyncMode::Baseline, true) => "SYNCED",
            (SyncMode::Baseline, false) => "NOT IN SYNC",
            (SyncMode::Incremental, true) => "CHANGES APPLIED",
            (SyncMode::Incremental, false) => "CHANGES PART APPLIED",
        }
    }
}

impl fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status: {} (", self.status_word())?;
        match self.mode {
            SyncMode::Audit => write!(
                f,
                "same={}, to create={}, to update={}, to delete={}",
                self.same, self.created, self.updated, self.deleted
            )?,
            SyncMode::Baseline => {
                write!(
                    f,
                    "same={}, created={}, updated={}, deleted={}",
                    self.same, self.created, self.updated, self.deleted
                )?;
                if self.not_deleted > 0 {
                    write!(f, ", not deleted={}", self.not_deleted)?;
                }
            }
            SyncMode::Incremental => write!(
                f,
                "created={}, updated={}, deleted={}",
                self.created, self.updated, self.deleted
            )?,
        }
        if !self.failures.is_empty() {
            write!(f, ", failed={}", self.failures.len())?;
        }
        f.write_str(")")
    }
}
