//! `resync resourcelist | changelist | capabilitylist | description`
//!
//! Manifests go to stdout unless `--outfile` is given, in which case large
//! lists are split into numbered components plus an index.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use resync_core::HashAlgorithm;
use resync_sync::Client;

use super::{absolutize, mapped_client};

/// Arguments for `resync resourcelist`.
#[derive(Args, Debug)]
pub struct ResourceListArgs {
    /// URI root the tree is published under.
    pub uri_root: String,

    /// Local directory to list.
    pub path_root: PathBuf,

    /// Only list these files or directories (repeatable).
    #[arg(long = "path", value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Write to FILE (paginated when over the entry limit).
    #[arg(long, value_name = "FILE")]
    pub outfile: Option<PathBuf>,

    /// Include content checksums.
    #[arg(long)]
    pub checksum: bool,

    /// Checksum algorithm: md5 or sha-256.
    #[arg(long, value_name = "ALG")]
    pub hash: Option<HashAlgorithm>,

    /// Maximum entries per document; 0 means unlimited.
    #[arg(long, value_name = "N")]
    pub max_entries: Option<usize>,
}

impl ResourceListArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let mut cfg = super::load_config(config)?;
        cfg.checksum |= self.checksum || self.hash.is_some();
        if let Some(hash) = self.hash {
            cfg.hash_algorithm = hash;
        }
        if let Some(max) = self.max_entries {
            cfg.max_entries_per_page = max;
        }

        let client = mapped_client(cfg, &self.uri_root, &self.path_root)?;
        let paths = (!self.paths.is_empty()).then_some(self.paths.as_slice());
        let written = client
            .write_resource_list(paths, self.outfile.as_deref(), io::stdout().lock())
            .context("cannot write resource list")?;
        report_written(&written);
        Ok(())
    }
}

/// Arguments for `resync changelist`.
#[derive(Args, Debug)]
pub struct ChangeListArgs {
    /// URI root the tree is published under.
    pub uri_root: String,

    /// Local directory holding the current state.
    pub path_root: PathBuf,

    /// Resource list describing the earlier state.
    #[arg(long, value_name = "LOC")]
    pub reference: String,

    /// Resource list describing the newer state (default: scan PATH_ROOT).
    #[arg(long = "newreference", value_name = "LOC")]
    pub new_reference: Option<String>,

    /// Write to FILE (paginated when over the entry limit).
    #[arg(long, value_name = "FILE")]
    pub outfile: Option<PathBuf>,

    /// Compare checksums when both lists carry them.
    #[arg(long)]
    pub checksum: bool,
}

impl ChangeListArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let mut cfg = super::load_config(config)?;
        cfg.checksum |= self.checksum;

        let client = mapped_client(cfg, &self.uri_root, &self.path_root)?;
        let reference = absolutize(&client, &self.reference)?;
        let newer = self
            .new_reference
            .as_deref()
            .map(|loc| absolutize(&client, loc))
            .transpose()?;
        let written = client
            .write_change_list(
                &reference,
                newer.as_deref(),
                self.outfile.as_deref(),
                io::stdout().lock(),
            )
            .context("cannot write change list")?;
        report_written(&written);
        Ok(())
    }
}

/// Arguments for `resync capabilitylist`.
#[derive(Args, Debug)]
pub struct CapabilityListArgs {
    /// Capabilities as NAME=URI (e.g. resourcelist=http://example.org/rl.xml).
    #[arg(required = true, value_name = "NAME=URI", value_parser = parse_capability)]
    pub capabilities: Vec<(String, String)>,
}

impl CapabilityListArgs {
    pub fn run(self) -> Result<()> {
        let client = Client::new(Default::default());
        let mut out = io::stdout().lock();
        client
            .write_capability_list(self.capabilities, &mut out)
            .context("cannot write capability list")?;
        writeln!(out)?;
        Ok(())
    }
}

/// Arguments for `resync description`.
#[derive(Args, Debug)]
pub struct DescriptionArgs {
    /// Capability list URIs.
    #[arg(required = true, value_name = "URI")]
    pub capability_lists: Vec<String>,
}

impl DescriptionArgs {
    pub fn run(self) -> Result<()> {
        let client = Client::new(Default::default());
        let mut out = io::stdout().lock();
        client
            .write_source_description(self.capability_lists, &mut out)
            .context("cannot write source description")?;
        writeln!(out)?;
        Ok(())
    }
}

fn parse_capability(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, uri)) if !name.is_empty() && !uri.is_empty() => {
            Ok((name.to_string(), uri.to_string()))
        }
        _ => Err(format!("expected NAME=URI, got '{s}'")),
    }
}

fn report_written(written: &[PathBuf]) {
    for path in written {
        eprintln!("wrote {}", path.display());
    }
}
