//! Error types for resync-sync.

use std::path::PathBuf;

use thiserror::Error;

use resync_core::{ChangeKind, MapperError, ModelError};
use resync_manifest::ManifestError;

/// Terminal configuration failures. Raised before any destination mutation;
/// the whole run stops.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("no mapping configured")]
    NoMapping,

    #[error(transparent)]
    Mapping(#[from] MapperError),

    /// The source manifest could not be fetched or parsed.
    #[error("cannot read source at {location}: {reason}")]
    SourceUnreadable { location: String, reason: String },

    /// Zero resources where at least one is required.
    #[error("no resources found in source {location}")]
    NoResources { location: String },

    /// A source resource outside the source authority, without `noauth`.
    #[error("resource {uri} is outside the source authority {authority}")]
    OutsideAuthority { uri: String, authority: String },

    #[error("bad datetime '{value}'")]
    BadDatetime { value: String },

    /// Incremental run with no explicit start and nothing recorded.
    #[error("no start datetime given and no previous sync recorded for {uri_root}")]
    NoIncrementalStart { uri_root: String },
}

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fatal: {0}")]
    Fatal(#[from] FatalError),

    /// A mapping failure outside a top-level operation.
    #[error("mapping error: {0}")]
    Mapping(#[from] MapperError),

    /// A manifest that could not be parsed.
    #[error("failed to parse {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: ManifestError,
    },

    #[error("failed to fetch {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: TransferError,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON error in the status store.
    #[error("status store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid list: {0}")]
    Model(#[from] ModelError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),
}

impl SyncError {
    /// Whether this error aborted the run as a configuration failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Fatal(_))
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// A fetch, copy or delete failure for a single resource.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("HTTP {status} from {location}")]
    Status { location: String, status: u16 },

    #[error("request to {location} failed: {reason}")]
    Request { location: String, reason: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Mapping(#[from] MapperError),

    #[error("unsupported location {0}")]
    Unsupported(String),
}

pub(crate) fn transfer_io(path: impl Into<PathBuf>, source: std::io::Error) -> TransferError {
    TransferError::Io {
        path: path.into(),
        source,
    }
}

/// A recorded per-resource failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    pub uri: String,
    pub change: ChangeKind,
    pub reason: String,
}
