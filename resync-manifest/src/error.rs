//! Error types for resync-manifest.

use std::path::PathBuf;

use thiserror::Error;

use resync_core::ModelError;

/// Boxed error returned by a caller-supplied fetch function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// All errors that can arise while reading or writing manifests.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Malformed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed attribute syntax.
    #[error("XML attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    /// The document root is neither `urlset` nor `sitemapindex`.
    #[error("unexpected document root '{0}'; expected urlset or sitemapindex")]
    UnexpectedRoot(String),

    /// A root `rs:md` declared a capability outside the known set.
    #[error("unknown capability '{0}'")]
    UnknownCapability(String),

    /// The document ended with `<{0}>` still open (a cut-off transfer).
    #[error("document truncated: <{0}> is not closed")]
    Truncated(String),

    /// A `<url>` or `<sitemap>` entry without `<loc>`.
    #[error("entry without <loc> element")]
    MissingLoc,

    #[error("bad datetime '{value}'")]
    BadDatetime { value: String },

    #[error("bad value for attribute '{name}': {reason}")]
    BadAttribute { name: String, reason: String },

    /// The parsed entries violate a list invariant (e.g. duplicate URIs).
    #[error("invalid list: {0}")]
    Model(#[from] ModelError),

    /// More entries than fit a single document; write with pagination instead.
    #[error("{count} entries exceed the single-document limit of {max}")]
    TooManyEntries { count: usize, max: usize },

    /// An index that points at another index.
    #[error("sitemap index {location} references another index")]
    NestedIndex { location: String },

    /// The fetch function failed for a document or index component.
    #[error("failed to fetch {location}: {source}")]
    Fetch {
        location: String,
        #[source]
        source: BoxError,
    },

    /// I/O failure writing a manifest file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on a caller-supplied sink.
    #[error("write error: {0}")]
    Write(#[from] std::io::Error),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ManifestError {
    ManifestError::Io {
        path: path.into(),
        source,
    }
}
