//! The sync client: ties mapping, manifests, diff and transfers together.
//!
//! ## Baseline / audit
//!
//! 1. Require a mapping.
//! 2. Read the source resource list (following an index if paginated).
//! 3. Refuse an empty source; drop checksum mode if the source has none.
//! 4. Scan the destination tree and diff.
//! 5. Refuse created/updated resources outside the source authority.
//! 6. Emit the pending status; stop here for an audit or when in sync.
//! 7. Apply the delta and emit the applied status.
//!
//! Steps 1 to 5 run before any destination mutation; their failures are
//! [`FatalError`]s.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use resync_core::{
    ChangeKind, ChangeList, HashAlgorithm, Mapper, MapperError, Resource, ResourceList, SyncConfig,
};
use resync_manifest::{BoxError, Manifest, UrlSet};

use crate::authority::Authority;
use crate::builder::ResourceListBuilder;
use crate::diff::{diff, Delta};
use crate::error::{FatalError, SyncError};
use crate::events::{EventSink, SyncEvent, TracingSink};
use crate::executor::{tally, Executor, Task};
use crate::publisher;
use crate::status_store;
use crate::summary::{SyncMode, SyncSummary};
use crate::transport::{DefaultTransport, Transport};

pub struct Client {
    config: SyncConfig,
    mapper: Mapper,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn EventSink>,
    state_home: Option<PathBuf>,
    sitemap: Option<String>,
    change_list: Option<String>,
}

impl Client {
    /// A client with the default transport and a tracing sink. No status
    /// store is used until [`Client::with_state_home`] is called.
    pub fn new(config: SyncConfig) -> Self {
        let transport = DefaultTransport::new(Duration::from_secs(config.timeout_secs));
        Self {
            config,
            mapper: Mapper::new(),
            transport: Arc::new(transport),
            sink: Arc::new(TracingSink),
            state_home: None,
            sitemap: None,
            change_list: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Keep incremental status under `<home>/.resync/`.
    pub fn with_state_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.state_home = Some(home.into());
        self
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    /// Set the single active mapping. An unsafe mapping is fatal and leaves
    /// the client with no mapping at all.
    pub fn set_mapping(&mut self, uri_root: &str, path_root: impl AsRef<Path>) -> Result<(), SyncError> {
        if let Err(err) = self.mapper.set_mapping(uri_root, path_root) {
            self.mapper = Mapper::new();
            return Err(FatalError::Mapping(err).into());
        }
        Ok(())
    }

    pub fn mapper(&self) -> &Mapper {
        &self.mapper
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether checksum comparison is on. Reading a source without
    /// checksums turns it off for the rest of the run.
    pub fn checksum(&self) -> bool {
        self.config.checksum
    }

    pub fn set_checksum(&mut self, checksum: bool) {
        self.config.checksum = checksum;
    }

    /// Override the source resource list location.
    pub fn set_sitemap(&mut self, location: Option<String>) {
        self.sitemap = location;
    }

    /// Override the source change list location.
    pub fn set_change_list(&mut self, location: Option<String>) {
        self.change_list = location;
    }

    /// Resolve a manifest reference: absolute URIs and paths unchanged,
    /// relative ones under the URI root.
    pub fn sitemap_uri(&self, reference: &str) -> Result<String, MapperError> {
        self.mapper.resolve_reference(reference)
    }

    pub fn log_event(&self, msg: &str) {
        self.sink.emit(&SyncEvent::Custom(msg.to_string()));
    }

    // -----------------------------------------------------------------------
    // Lists
    // -----------------------------------------------------------------------

    /// Scan local files into a resource list.
    pub fn build_resource_list(&self, paths: Option<&[PathBuf]>) -> Result<ResourceList, SyncError> {
        self.require_mapping()?;
        let algorithm = self.config.checksum.then_some(self.config.hash_algorithm);
        self.builder(algorithm).build(paths).map_err(fatal_mapping)
    }

    /// Read a resource list (or any non-change manifest) from `location`.
    pub fn read_resource_list(&self, location: &str) -> Result<ResourceList, SyncError> {
        let mut list = self
            .read_urlset(location)?
            .into_resource_list()
            .map_err(|source| parse_err(location, source))?;
        list.max_entries_per_page = self.config.max_entries_per_page;
        Ok(list)
    }

    pub fn read_change_list(&self, location: &str) -> Result<ChangeList, SyncError> {
        self.read_urlset(location)?
            .into_change_list()
            .map_err(|source| parse_err(location, source))
    }

    /// Parse one document and report its kind and size.
    pub fn parse_document(&self, reference: &str) -> Result<Manifest, SyncError> {
        let location = self.resolve_fatal(reference)?;
        let bytes = self
            .transport
            .fetch(&location)
            .map_err(|source| SyncError::Fetch {
                location: location.clone(),
                source,
            })?;
        let manifest = resync_manifest::parse(&bytes).map_err(|source| parse_err(&location, source))?;
        self.sink.emit(&SyncEvent::Parsed {
            kind: manifest.kind(),
            entries: manifest.len(),
            index: manifest.is_index(),
        });
        Ok(manifest)
    }

    fn read_urlset(&self, location: &str) -> Result<UrlSet, SyncError> {
        let transport = Arc::clone(&self.transport);
        resync_manifest::read_with(location, |loc| {
            transport.fetch(loc).map_err(|e| Box::new(e) as BoxError)
        })
        .map_err(|source| parse_err(location, source))
    }

    // -----------------------------------------------------------------------
    // Baseline / audit
    // -----------------------------------------------------------------------

    pub fn audit(&mut self) -> Result<SyncSummary, SyncError> {
        self.baseline_or_audit(true, false)
    }

    pub fn baseline(&mut self, allow_deletion: bool) -> Result<SyncSummary, SyncError> {
        self.baseline_or_audit(false, allow_deletion)
    }

    pub fn baseline_or_audit(
        &mut self,
        audit_only: bool,
        allow_deletion: bool,
    ) -> Result<SyncSummary, SyncError> {
        self.require_mapping()?;
        let uri_root = self.uri_root()?;
        let location = match &self.sitemap {
            Some(location) => self.resolve_fatal(location)?,
            None => self.resolve_fatal(&self.config.resource_list_name)?,
        };

        let src = self
            .read_resource_list(&location)
            .map_err(|e| unreadable(&location, e))?;
        tracing::info!(location = %location, resources = src.len(), "read source resource list");
        if src.is_empty() {
            return Err(FatalError::NoResources { location }.into());
        }

        if self.config.checksum && !src.has_checksums() {
            tracing::warn!(
                location = %location,
                "source list has no checksums, disabling checksum comparison"
            );
            self.config.checksum = false;
        }
        let algorithm = src.checksum_algorithm().filter(|_| self.config.checksum);
        let dst = self
            .builder(algorithm)
            .include_hidden(true)
            .build(None)
            .map_err(fatal_mapping)?;

        let delta = diff(&src, &dst, self.config.checksum);
        self.check_authority(&uri_root, delta.created.iter().chain(&delta.updated))?;

        let pending = SyncSummary::audit(&delta);
        self.sink.emit(&SyncEvent::Status(pending.clone()));
        if audit_only {
            return Ok(pending);
        }
        if delta.in_sync() {
            self.record_status(src.at.unwrap_or_else(Utc::now));
            return Ok(SyncSummary {
                same: delta.same.len(),
                ..SyncSummary::new(SyncMode::Baseline)
            });
        }

        let summary = self.apply_delta(delta, allow_deletion);
        self.sink.emit(&SyncEvent::Status(summary.clone()));
        if summary.failures.is_empty() {
            self.record_status(src.at.unwrap_or_else(Utc::now));
        }
        Ok(summary)
    }

    fn apply_delta(&self, delta: Delta, allow_deletion: bool) -> SyncSummary {
        let mut summary = SyncSummary::new(SyncMode::Baseline);
        summary.same = delta.same.len();

        let mut tasks: Vec<Task> = Vec::with_capacity(delta.created.len() + delta.updated.len());
        tasks.extend(delta.created.into_iter().map(|r| Task::new(r, ChangeKind::Created)));
        tasks.extend(delta.updated.into_iter().map(|r| Task::new(r, ChangeKind::Updated)));
        if allow_deletion {
            tasks.extend(delta.deleted.into_iter().map(|r| Task::new(r, ChangeKind::Deleted)));
        } else if !delta.deleted.is_empty() {
            tracing::warn!(
                count = delta.deleted.len(),
                "destination has resources not in the source; deletion is off"
            );
            summary.not_deleted = delta.deleted.len();
        }

        let outcomes = Executor::new(&self.mapper, self.transport.as_ref())
            .workers(self.config.workers)
            .run(&tasks);
        tally(&mut summary, outcomes);
        summary
    }

    // -----------------------------------------------------------------------
    // Incremental
    // -----------------------------------------------------------------------

    /// Apply the source change list from `from` (a W3C datetime), or from
    /// the point recorded by the last successful run.
    pub fn incremental(&mut self, from: Option<&str>) -> Result<SyncSummary, SyncError> {
        self.require_mapping()?;
        let uri_root = self.uri_root()?;
        let from = match from {
            Some(value) => resync_manifest::datetime::parse(value).map_err(|_| {
                FatalError::BadDatetime {
                    value: value.to_string(),
                }
            })?,
            None => self.recorded_from()?,
        };
        let location = match &self.change_list {
            Some(location) => self.resolve_fatal(location)?,
            None => self.resolve_fatal(&self.config.change_list_name)?,
        };

        let mut changes = self
            .read_change_list(&location)
            .map_err(|e| unreadable(&location, e))?;
        let skipped = changes.prune_before(from);
        if skipped > 0 {
            tracing::debug!(skipped, "change list entries before start datetime");
        }
        let listed = changes.len();
        self.sink.emit(&SyncEvent::ChangesListed(listed));

        self.check_authority(
            &uri_root,
            changes.iter().filter(|r| r.change != Some(ChangeKind::Deleted)),
        )?;

        let superseded = changes.prune_superseded();
        if superseded > 0 {
            tracing::debug!(superseded, "superseded change list entries");
        }
        let tasks: Vec<Task> = changes
            .iter()
            .filter_map(|r| r.change.map(|change| Task::new(pinned(r), change)))
            .collect();

        let mut summary = SyncSummary::new(SyncMode::Incremental);
        summary.changes_listed = listed;
        let outcomes = Executor::new(&self.mapper, self.transport.as_ref())
            .workers(self.config.workers)
            .converge(true)
            .checksum(self.config.checksum)
            .run(&tasks);
        tally(&mut summary, outcomes);
        self.sink.emit(&SyncEvent::Status(summary.clone()));

        if summary.failures.is_empty() {
            let next = changes.until.or(changes.latest()).unwrap_or(from).max(from);
            self.record_status(next);
        }
        Ok(summary)
    }

    /// Start point recorded for the active mapping.
    fn recorded_from(&self) -> Result<DateTime<Utc>, SyncError> {
        let mapping = self.mapper.mapping().ok_or(FatalError::NoMapping)?;
        let recorded = match &self.state_home {
            Some(home) => status_store::load_at(home)?.from_for(mapping),
            None => None,
        };
        recorded.ok_or_else(|| {
            FatalError::NoIncrementalStart {
                uri_root: mapping.uri_root().to_string(),
            }
            .into()
        })
    }

    fn record_status(&self, from: DateTime<Utc>) {
        let (Some(home), Some(mapping)) = (&self.state_home, self.mapper.mapping()) else {
            return;
        };
        if let Err(err) = status_store::record_at(home, mapping, from) {
            tracing::warn!(error = %err, "could not record sync status");
        }
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    /// Scan the mapped tree (or `paths`) and write a resource list.
    ///
    /// With `outfile`, lists over the page limit are written as numbered
    /// components plus an index; the written files are returned. Without
    /// it, a single document goes to `out`.
    pub fn write_resource_list(
        &self,
        paths: Option<&[PathBuf]>,
        outfile: Option<&Path>,
        out: impl Write,
    ) -> Result<Vec<PathBuf>, SyncError> {
        let list = self.build_resource_list(paths)?;
        self.emit_manifest(&list, outfile, out)
    }

    /// Write a change list describing what changed between the resource
    /// list at `reference` and `newer` (another resource list, or the mapped
    /// tree when `None`).
    pub fn write_change_list(
        &self,
        reference: &str,
        newer: Option<&str>,
        outfile: Option<&Path>,
        out: impl Write,
    ) -> Result<Vec<PathBuf>, SyncError> {
        let old = self.read_resource_list(&self.resolve_fatal(reference)?)?;
        let new = match newer {
            Some(location) => self.read_resource_list(&self.resolve_fatal(location)?)?,
            None => {
                let algorithm = old.checksum_algorithm().filter(|_| self.config.checksum);
                self.require_mapping()?;
                self.builder(algorithm).build(None).map_err(fatal_mapping)?
            }
        };
        let checksum = self.config.checksum && old.has_checksums() && new.has_checksums();
        let delta = diff(&new, &old, checksum);

        let until = Utc::now();
        let mut changes = ChangeList::new();
        changes.max_entries_per_page = self.config.max_entries_per_page;
        changes.from = old.at;
        changes.until = Some(until);
        let events = [
            (ChangeKind::Created, delta.created),
            (ChangeKind::Updated, delta.updated),
            (ChangeKind::Deleted, delta.deleted),
        ];
        for (kind, resources) in events {
            for resource in resources {
                let at = match kind {
                    ChangeKind::Deleted => until,
                    _ => resource.lastmod.unwrap_or(until),
                };
                changes.add(resource.with_change(kind, at))?;
            }
        }
        changes.sort();
        self.emit_manifest(&changes, outfile, out)
    }

    pub fn write_capability_list<I, N, U>(&self, capabilities: I, out: impl Write) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = (N, U)>,
        N: Into<String>,
        U: Into<String>,
    {
        publisher::write_capability_list(capabilities, out)
    }

    pub fn write_source_description<I, U>(&self, capability_lists: I, out: impl Write) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        publisher::write_source_description(capability_lists, out)
    }

    fn emit_manifest<M>(&self, manifest: &M, outfile: Option<&Path>, out: impl Write) -> Result<Vec<PathBuf>, SyncError>
    where
        M: resync_manifest::ManifestSource,
    {
        match outfile {
            Some(path) => {
                let written = resync_manifest::write_paginated(manifest, path, |p| {
                    self.mapper
                        .path_to_uri(p)
                        .unwrap_or_else(|_| p.to_string_lossy().into_owned())
                })?;
                tracing::info!(path = %path.display(), files = written.len(), "wrote manifest");
                Ok(written)
            }
            None => {
                resync_manifest::write(manifest, out)?;
                Ok(Vec::new())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn builder(&self, checksum: Option<HashAlgorithm>) -> ResourceListBuilder<'_> {
        ResourceListBuilder::new(&self.mapper)
            .checksum(checksum)
            .max_entries_per_page(self.config.max_entries_per_page)
    }

    fn require_mapping(&self) -> Result<(), FatalError> {
        if self.mapper.is_set() {
            Ok(())
        } else {
            Err(FatalError::NoMapping)
        }
    }

    fn uri_root(&self) -> Result<String, FatalError> {
        self.mapper
            .mapping()
            .map(|m| m.uri_root().to_string())
            .ok_or(FatalError::NoMapping)
    }

    fn resolve_fatal(&self, reference: &str) -> Result<String, FatalError> {
        Ok(self.sitemap_uri(reference)?)
    }

    /// Every resource must share the URI root's authority unless `noauth`.
    fn check_authority<'r>(
        &self,
        uri_root: &str,
        resources: impl Iterator<Item = &'r Resource>,
    ) -> Result<(), FatalError> {
        let authority = Authority::of(uri_root);
        for resource in resources {
            if Authority::of(&resource.uri) == authority {
                continue;
            }
            if self.config.noauth {
                tracing::warn!(uri = %resource.uri, authority = %authority, "accepting resource outside source authority");
                continue;
            }
            return Err(FatalError::OutsideAuthority {
                uri: resource.uri.clone(),
                authority: authority.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_err(location: &str, source: resync_manifest::ManifestError) -> SyncError {
    SyncError::Parse {
        location: location.to_string(),
        source,
    }
}

/// Change entries often carry only a change datetime; use it as `lastmod`
/// so the downloaded file's mtime is pinned and a re-applied list converges.
fn pinned(resource: &Resource) -> Resource {
    let mut resource = resource.clone();
    if resource.lastmod.is_none() && resource.change != Some(ChangeKind::Deleted) {
        resource.lastmod = resource.change_datetime;
    }
    resource
}

/// A mapping failure inside a top-level operation is terminal.
fn fatal_mapping(err: SyncError) -> SyncError {
    match err {
        SyncError::Mapping(e) => FatalError::Mapping(e).into(),
        other => other,
    }
}

fn unreadable(location: &str, err: SyncError) -> SyncError {
    FatalError::SourceUnreadable {
        location: location.to_string(),
        reason: err.to_string(),
    }
    .into()
}
