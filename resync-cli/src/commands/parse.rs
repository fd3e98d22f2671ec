//! `resync parse <LOCATION>`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

/// Arguments for `resync parse`.
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Manifest path or URI.
    pub location: String,
}

impl ParseArgs {
    pub fn run(self, config: Option<&Path>) -> Result<()> {
        let client = super::client(super::load_config(config)?)?;
        let location = super::absolutize(&client, &self.location)?;
        client
            .parse_document(&location)
            .with_context(|| format!("cannot parse {}", self.location))?;
        Ok(())
    }
}
