//! resync: synchronize a local tree with a ResourceSync source.
//!
//! # Usage
//!
//! ```text
//! resync [--config FILE] baseline <URI_ROOT> <PATH_ROOT> [--delete] [--checksum] [--noauth] [--sitemap LOC] [--workers N]
//! resync [--config FILE] audit <URI_ROOT> <PATH_ROOT> [--checksum] [--noauth] [--sitemap LOC]
//! resync [--config FILE] incremental <URI_ROOT> <PATH_ROOT> [--from DATETIME] [--changelist LOC] [--noauth]
//! resync parse <LOCATION>
//! resync resourcelist <URI_ROOT> <PATH_ROOT> [--path P]... [--outfile F] [--checksum] [--max-entries N]
//! resync changelist <URI_ROOT> <PATH_ROOT> --reference LOC [--newreference LOC] [--outfile F]
//! resync capabilitylist <NAME=URI>...
//! resync description <URI>...
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    parse::ParseArgs,
    publish::{CapabilityListArgs, ChangeListArgs, DescriptionArgs, ResourceListArgs},
    sync::{AuditArgs, BaselineArgs, IncrementalArgs},
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "resync",
    version,
    about = "Synchronize a local tree with a ResourceSync source",
    long_about = None,
)]
struct Cli {
    /// Configuration file (default: ~/.resync/config.yaml).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring the destination into sync with the source resource list.
    Baseline(BaselineArgs),

    /// Report what a baseline would change, without changing anything.
    Audit(AuditArgs),

    /// Apply the source change list since a datetime.
    Incremental(IncrementalArgs),

    /// Parse a manifest and report its kind and size.
    Parse(ParseArgs),

    /// Write a resource list for a local tree.
    #[command(name = "resourcelist")]
    ResourceList(ResourceListArgs),

    /// Write a change list between a reference list and a newer state.
    #[command(name = "changelist")]
    ChangeList(ChangeListArgs),

    /// Write a capability list.
    #[command(name = "capabilitylist")]
    CapabilityList(CapabilityListArgs),

    /// Write a source description.
    Description(DescriptionArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Baseline(args) => args.run(config),
        Commands::Audit(args) => args.run(config),
        Commands::Incremental(args) => args.run(config),
        Commands::Parse(args) => args.run(config),
        Commands::ResourceList(args) => args.run(config),
        Commands::ChangeList(args) => args.run(config),
        Commands::CapabilityList(args) => args.run(),
        Commands::Description(args) => args.run(),
    }
}

/// Log to stderr so manifests written to stdout stay clean.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
