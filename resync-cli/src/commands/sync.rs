//! `resync baseline | audit | incremental`

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use resync_core::SyncConfig;
use resync_sync::SyncSummary;

use super::mapped_client;

/// Source and destination shared by every sync command.
#[derive(Args, Debug)]
pub struct MappingArgs {
    /// Source URI root (e.g. http://example.org/).
    pub uri_root: String,

    /// Local destination directory.
    pub path_root: PathBuf,

    /// Accept resources outside the source URI's authority.
    #[arg(long)]
    pub noauth: bool,

    /// Transfer worker threads.
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,
}

impl MappingArgs {
    fn apply(&self, config: &mut SyncConfig) {
        if self.noauth {
            config.noauth = true;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
    }
}

/// Arguments for `resync baseline`.
#[derive(Args, Debug)]
pub struct BaselineArgs {
    #[command(flatten)]
    pub mapping: MappingArgs,

    /// Remove destination files that are not in the source.
    #[arg(long)]
    pub delete: bool,

    /// Compare checksums as well as timestamps.
    #[arg(long)]
    pub checksum: bool,

    /// Source resource list location (default: resourcelist.xml under the URI root).
    #[arg(long, value_name = "LOC")]
    pub sitemap: Option<String>,
}

impl BaselineArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let mut cfg = super::load_config(config)?;
        self.mapping.apply(&mut cfg);
        cfg.checksum |= self.checksum;
        let allow_deletion = self.delete || cfg.allow_deletion;

        let mut client = mapped_client(cfg, &self.mapping.uri_root, &self.mapping.path_root)?;
        client.set_sitemap(self.sitemap);
        let summary = client
            .baseline_or_audit(false, allow_deletion)
            .context("baseline sync failed")?;
        check_failures(&summary)
    }
}

/// Arguments for `resync audit`.
#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(flatten)]
    pub mapping: MappingArgs,

    /// Compare checksums as well as timestamps.
    #[arg(long)]
    pub checksum: bool,

    /// Source resource list location (default: resourcelist.xml under the URI root).
    #[arg(long, value_name = "LOC")]
    pub sitemap: Option<String>,
}

impl AuditArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let mut cfg = super::load_config(config)?;
        self.mapping.apply(&mut cfg);
        cfg.checksum |= self.checksum;

        let mut client = mapped_client(cfg, &self.mapping.uri_root, &self.mapping.path_root)?;
        client.set_sitemap(self.sitemap);
        client.baseline_or_audit(true, false).context("audit failed")?;
        Ok(())
    }
}

/// Arguments for `resync incremental`.
#[derive(Args, Debug)]
pub struct IncrementalArgs {
    #[command(flatten)]
    pub mapping: MappingArgs,

    /// Apply changes at or after this W3C datetime (default: the end of the
    /// last successful sync).
    #[arg(long, value_name = "DATETIME")]
    pub from: Option<String>,

    /// Source change list location (default: changelist.xml under the URI root).
    #[arg(long, value_name = "LOC")]
    pub changelist: Option<String>,
}

impl IncrementalArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let mut cfg = super::load_config(config)?;
        self.mapping.apply(&mut cfg);

        let mut client = mapped_client(cfg, &self.mapping.uri_root, &self.mapping.path_root)?;
        client.set_change_list(self.changelist);
        let summary = client
            .incremental(self.from.as_deref())
            .context("incremental sync failed")?;
        check_failures(&summary)
    }
}

fn check_failures(summary: &SyncSummary) -> Result<()> {
    if summary.failures.is_empty() {
        return Ok(());
    }
    for failure in &summary.failures {
        eprintln!("failed {} {}: {}", failure.change, failure.uri, failure.reason);
    }
    bail!("{} resource transfer(s) failed", summary.failures.len())
}
