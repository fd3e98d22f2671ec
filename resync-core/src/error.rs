//! Error types for resync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while translating between the URI and local-path namespaces.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapperError {
    /// A relative reference or a translation was requested with no mapping configured.
    #[error("no mapping configured to resolve '{reference}'")]
    NoMapping { reference: String },

    /// The two roots are identical or nested one inside the other.
    #[error("unsafe mapping: {uri_root} -> {path_root} (roots are identical or nested)")]
    UnsafeMapping { uri_root: String, path_root: PathBuf },

    /// The URI does not fall under the configured URI root.
    #[error("URI {uri} is not under mapped root {root}")]
    UriOutsideRoot { uri: String, root: String },

    /// The path does not fall under the configured path root.
    #[error("path {path} is not under mapped root {root}")]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    /// A URI segment would escape the destination root once mapped (`..`, `.`).
    #[error("URI {uri} contains an unsafe path segment")]
    UnsafeSegment { uri: String },
}

/// Violations of the resource/list invariants.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A URI appeared twice in one resource list.
    #[error("duplicate resource URI in list: {0}")]
    DuplicateUri(String),

    /// A change list entry without a change kind.
    #[error("change list entry {uri} has no change kind")]
    MissingChange { uri: String },

    /// A change list entry without a change datetime.
    #[error("change list entry {uri} has no change datetime")]
    MissingChangeDatetime { uri: String },
}

/// Errors loading the on-disk configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading the configuration file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML; includes the file path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
