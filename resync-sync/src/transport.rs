//! Byte transport for manifests and resources.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use resync_core::mapper::has_scheme;

use crate::error::{transfer_io, TransferError};

pub type Stream = Box<dyn Read + Send>;

/// Opens a location for reading. Implementations must be shareable across
/// transfer workers.
pub trait Transport: Send + Sync {
    fn open(&self, location: &str) -> Result<Stream, TransferError>;

    /// Read a whole location into memory.
    fn fetch(&self, location: &str) -> Result<Vec<u8>, TransferError> {
        let mut bytes = Vec::new();
        self.open(location)?
            .read_to_end(&mut bytes)
            .map_err(|e| transfer_io(location, e))?;
        Ok(bytes)
    }
}

/// Local paths and `file://` URLs from disk; `http(s)://` over the network.
pub struct DefaultTransport {
    agent: ureq::Agent,
}

impl DefaultTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for DefaultTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Transport for DefaultTransport {
    fn open(&self, location: &str) -> Result<Stream, TransferError> {
        if let Some(path) = local_path(location) {
            return open_file(&path);
        }
        if !(location.starts_with("http://") || location.starts_with("https://")) {
            return Err(TransferError::Unsupported(location.to_string()));
        }
        tracing::debug!(location, "GET");
        match self.agent.get(location).call() {
            Ok(response) => Ok(Box::new(response.into_reader())),
            Err(ureq::Error::Status(status, _)) => Err(TransferError::Status {
                location: location.to_string(),
                status,
            }),
            Err(err) => Err(TransferError::Request {
                location: location.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

/// Serves URIs under `uri_root` from a local copy of the published tree.
/// Local paths are read directly; anything else is unsupported.
pub struct MirrorTransport {
    uri_prefix: String,
    dir: PathBuf,
}

impl MirrorTransport {
    pub fn new(uri_root: &str, dir: impl Into<PathBuf>) -> Self {
        let trimmed = uri_root.trim_end_matches('/');
        Self {
            uri_prefix: format!("{trimmed}/"),
            dir: dir.into(),
        }
    }

    fn mirrored(&self, location: &str) -> Option<PathBuf> {
        let rel = location.strip_prefix(&self.uri_prefix)?;
        let mut path = self.dir.clone();
        for segment in rel.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." {
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }
}

impl Transport for MirrorTransport {
    fn open(&self, location: &str) -> Result<Stream, TransferError> {
        if let Some(path) = self.mirrored(location) {
            return open_file(&path);
        }
        match local_path(location) {
            Some(path) => open_file(&path),
            None => Err(TransferError::Unsupported(location.to_string())),
        }
    }
}

/// The filesystem path for a plain path or `file://` URL.
pub fn local_path(location: &str) -> Option<PathBuf> {
    if !has_scheme(location) {
        return Some(PathBuf::from(location));
    }
    Url::parse(location)
        .ok()
        .filter(|u| u.scheme() == "file")
        .and_then(|u| u.to_file_path().ok())
}

fn open_file(path: &Path) -> Result<Stream, TransferError> {
    let file = File::open(path).map_err(|e| transfer_io(path, e))?;
    Ok(Box::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_reads_local_paths_and_file_urls() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("doc.xml");
        std::fs::write(&file, "<urlset/>").unwrap();

        let t = DefaultTransport::default();
        assert_eq!(t.fetch(&file.to_string_lossy()).unwrap(), b"<urlset/>");
        let url = Url::from_file_path(&file).unwrap();
        assert_eq!(t.fetch(url.as_str()).unwrap(), b"<urlset/>");
    }

    #[test]
    fn default_rejects_unknown_schemes() {
        let err = DefaultTransport::default().open("info:whatever").err().unwrap();
        assert!(matches!(err, TransferError::Unsupported(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        let err = DefaultTransport::default()
            .fetch(&missing.to_string_lossy())
            .unwrap_err();
        assert!(matches!(err, TransferError::Io { .. }));
    }

    #[test]
    fn mirror_maps_uris_into_directory() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("a")).unwrap();
        std::fs::write(tmp.path().join("a/b.txt"), "hello").unwrap();

        let t = MirrorTransport::new("http://example.org/", tmp.path());
        assert_eq!(t.fetch("http://example.org/a/b.txt").unwrap(), b"hello");
        assert!(t.open("http://example.org/../etc/passwd").is_err());
        assert!(matches!(
            t.open("http://other.org/a/b.txt").err().unwrap(),
            TransferError::Unsupported(_)
        ));
    }
}
