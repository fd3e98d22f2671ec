pub mod parse;
pub mod publish;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use resync_core::{config, SyncConfig};
use resync_sync::{Client, EventSink, SyncEvent};

/// Prints event lines to stdout.
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: &SyncEvent) {
        println!("{event}");
    }
}

pub fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Load `--config FILE` if given, else `~/.resync/config.yaml`.
pub fn load_config(path: Option<&Path>) -> Result<SyncConfig> {
    match path {
        Some(path) => config::load_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => config::load_at(&home()?).context("failed to load ~/.resync/config.yaml"),
    }
}

/// A client reporting to stdout, with status kept under the home directory.
pub fn client(config: SyncConfig) -> Result<Client> {
    Ok(Client::new(config)
        .with_sink(Arc::new(StdoutSink))
        .with_state_home(home()?))
}

/// A client with `uri_root -> path_root` set.
pub fn mapped_client(config: SyncConfig, uri_root: &str, path_root: &Path) -> Result<Client> {
    let mut client = client(config)?;
    client
        .set_mapping(uri_root, path_root)
        .with_context(|| format!("cannot map {uri_root} to {}", path_root.display()))?;
    Ok(client)
}

/// Resolve a manifest location. Relative local files are taken from the
/// working directory, anything else goes through the client's mapping.
pub fn absolutize(client: &Client, location: &str) -> Result<String> {
    let path = Path::new(location);
    if path.is_relative() && path.exists() {
        let cwd = std::env::current_dir().context("cannot read working directory")?;
        return Ok(cwd.join(path).to_string_lossy().into_owned());
    }
    Ok(client.sitemap_uri(location)?)
}
