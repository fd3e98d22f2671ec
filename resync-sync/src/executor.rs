//! Apply resource changes to the destination tree.
//!
//! ## Download protocol
//!
//! 1. Map the URI to a destination path.
//! 2. Optionally skip when the destination already matches the entry.
//! 3. Stream the source into `.<name>.resync.tmp` beside the target.
//! 4. Rename over the target (atomic on POSIX).
//! 5. Set the target mtime to the entry's `lastmod`.
//! 6. Warn if length or checksum disagree with the entry.
//!
//! Transfers fan out over a worker pool. A failure is recorded for its
//! resource and never stops the others.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use rayon::prelude::*;

use resync_core::{ChangeKind, Mapper, Resource};

use crate::builder::{describe_file, file_checksum, TRANSFER_SUFFIX};
use crate::diff::is_same;
use crate::error::{transfer_io, TransferError, TransferFailure};
use crate::summary::SyncSummary;
use crate::transport::Transport;

/// One change to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub resource: Resource,
    pub change: ChangeKind,
}

impl Task {
    pub fn new(resource: Resource, change: ChangeKind) -> Self {
        Self { resource, change }
    }
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied(ChangeKind),
    /// The destination already matched; nothing transferred.
    Same,
    /// Delete of a target that was not there.
    Absent,
    Failed(TransferFailure),
}

pub struct Executor<'a> {
    mapper: &'a Mapper,
    transport: &'a dyn Transport,
    workers: usize,
    converge: bool,
    checksum: bool,
}

impl<'a> Executor<'a> {
    pub fn new(mapper: &'a Mapper, transport: &'a dyn Transport) -> Self {
        Self {
            mapper,
            transport,
            workers: 1,
            converge: false,
            checksum: false,
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Check the destination before each create/update and skip converged
    /// files.
    pub fn converge(mut self, converge: bool) -> Self {
        self.converge = converge;
        self
    }

    /// Use checksums in the convergence check.
    pub fn checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /// Run every task and return outcomes in task order.
    pub fn run(&self, tasks: &[Task]) -> Vec<Outcome> {
        if self.workers == 1 || tasks.len() < 2 {
            return tasks.iter().map(|t| self.apply(t)).collect();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
        {
            Ok(pool) => pool.install(|| tasks.par_iter().map(|t| self.apply(t)).collect()),
            Err(err) => {
                tracing::warn!(error = %err, "worker pool unavailable, applying sequentially");
                tasks.iter().map(|t| self.apply(t)).collect()
            }
        }
    }

    pub fn apply(&self, task: &Task) -> Outcome {
        let result = match task.change {
            ChangeKind::Created | ChangeKind::Updated => self.download(&task.resource),
            ChangeKind::Deleted => self.delete(&task.resource),
        };
        match result {
            Ok(Some(())) => Outcome::Applied(task.change),
            Ok(None) if task.change == ChangeKind::Deleted => Outcome::Absent,
            Ok(None) => Outcome::Same,
            Err(err) => {
                tracing::warn!(uri = %task.resource.uri, change = %task.change, error = %err, "transfer failed");
                Outcome::Failed(TransferFailure {
                    uri: task.resource.uri.clone(),
                    change: task.change,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// `Ok(None)` when skipped as already converged.
    fn download(&self, resource: &Resource) -> Result<Option<()>, TransferError> {
        let dest = self.mapper.uri_to_path(&resource.uri)?;
        if self.converge && dest.is_file() {
            let algorithm = resource.checksum.as_ref().map(|c| c.algorithm);
            let algorithm = algorithm.filter(|_| self.checksum);
            if let Ok(local) = describe_file(&dest, resource.uri.clone(), algorithm) {
                if is_same(resource, &local, self.checksum) {
                    tracing::debug!(uri = %resource.uri, "already up to date");
                    return Ok(None);
                }
            }
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| transfer_io(parent, e))?;
        }
        let tmp = tmp_path(&dest);
        let written = match self.stream_to(&resource.uri, &tmp) {
            Ok(n) => n,
            Err(err) => {
                let _ = std::fs::remove_file(&tmp);
                return Err(err);
            }
        };
        if let Err(e) = std::fs::rename(&tmp, &dest) {
            let _ = std::fs::remove_file(&tmp);
            return Err(transfer_io(&dest, e));
        }

        if let Some(lastmod) = resource.lastmod {
            let mtime = FileTime::from_unix_time(lastmod.timestamp(), lastmod.timestamp_subsec_nanos());
            filetime::set_file_mtime(&dest, mtime).map_err(|e| transfer_io(&dest, e))?;
        }
        verify(resource, &dest, written);
        tracing::debug!(uri = %resource.uri, path = %dest.display(), bytes = written, "downloaded");
        Ok(Some(()))
    }

    fn stream_to(&self, uri: &str, tmp: &Path) -> Result<u64, TransferError> {
        let mut reader = self.transport.open(uri)?;
        let mut file = File::create(tmp).map_err(|e| transfer_io(tmp, e))?;
        std::io::copy(&mut reader, &mut file).map_err(|e| transfer_io(tmp, e))
    }

    /// `Ok(None)` when the target was already absent.
    fn delete(&self, resource: &Resource) -> Result<Option<()>, TransferError> {
        let dest = self.mapper.uri_to_path(&resource.uri)?;
        match std::fs::remove_file(&dest) {
            Ok(()) => {
                tracing::debug!(uri = %resource.uri, path = %dest.display(), "deleted");
                Ok(Some(()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(transfer_io(&dest, e)),
        }
    }
}

/// Fold outcomes into `summary`.
pub fn tally(summary: &mut SyncSummary, outcomes: Vec<Outcome>) {
    for outcome in outcomes {
        match outcome {
            Outcome::Applied(ChangeKind::Created) => summary.created += 1,
            Outcome::Applied(ChangeKind::Updated) => summary.updated += 1,
            Outcome::Applied(ChangeKind::Deleted) => summary.deleted += 1,
            Outcome::Same => summary.same += 1,
            Outcome::Absent => {}
            Outcome::Failed(failure) => summary.failures.push(failure),
        }
    }
}

fn tmp_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}{TRANSFER_SUFFIX}"))
}

fn verify(resource: &Resource, dest: &Path, written: u64) {
    if let Some(expected) = resource.length {
        if expected != written {
            tracing::warn!(uri = %resource.uri, expected, actual = written, "downloaded length differs from manifest");
        }
    }
    if let Some(expected) = &resource.checksum {
        match file_checksum(dest, expected.algorithm) {
            Ok(actual) if actual != *expected => {
                tracing::warn!(uri = %resource.uri, expected = %expected, actual = %actual, "downloaded checksum differs from manifest");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(uri = %resource.uri, error = %err, "could not verify checksum"),
        }
    }
}
