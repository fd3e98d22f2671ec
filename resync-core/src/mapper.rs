//! URI ↔ local path translation.
//!
//! A [`Mapping`] pairs a URI root with a local path root. Translation is a
//! structural prefix substitution: `<uri_root>/a/b` ↔ `<path_root>/a/b`.
//!
//! A mapping is unsafe when the URI root has a local equivalent (a plain path
//! or a `file://` URL) that is identical to, or nested with, the path root.
//! Unsafe mappings are rejected at construction, so a [`Mapper`] never holds
//! one.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::MapperError;

/// A validated `(uri_root, path_root)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    uri_root: String,
    path_root: PathBuf,
}

impl Mapping {
    /// Validate and normalize a mapping. Trailing slashes on the URI root are
    /// dropped; the path root is made absolute and lexically cleaned.
    pub fn new(uri_root: &str, path_root: impl AsRef<Path>) -> Result<Self, MapperError> {
        let trimmed = uri_root.trim_end_matches('/');
        let uri_root = if trimmed.is_empty() && uri_root.starts_with('/') {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
        let path_root = normalize_path(path_root.as_ref());

        if let Some(local) = local_equivalent(&uri_root) {
            let local = normalize_path(&local);
            if local.starts_with(&path_root) || path_root.starts_with(&local) {
                return Err(MapperError::UnsafeMapping {
                    uri_root,
                    path_root,
                });
            }
        }

        Ok(Self {
            uri_root,
            path_root,
        })
    }

    pub fn uri_root(&self) -> &str {
        &self.uri_root
    }

    pub fn path_root(&self) -> &Path {
        &self.path_root
    }

    fn uri_prefix(&self) -> String {
        if self.uri_root.ends_with('/') {
            self.uri_root.clone()
        } else {
            format!("{}/", self.uri_root)
        }
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.uri_root, self.path_root.display())
    }
}

/// Holds at most one active [`Mapping`] and performs translations with it.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    mapping: Option<Mapping>,
}

impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapper with a mapping already set.
    pub fn with_mapping(uri_root: &str, path_root: impl AsRef<Path>) -> Result<Self, MapperError> {
        Ok(Self {
            mapping: Some(Mapping::new(uri_root, path_root)?),
        })
    }

    /// Replace the active mapping. On error the previous mapping is kept.
    pub fn set_mapping(
        &mut self,
        uri_root: &str,
        path_root: impl AsRef<Path>,
    ) -> Result<(), MapperError> {
        self.mapping = Some(Mapping::new(uri_root, path_root)?);
        Ok(())
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.mapping.is_some()
    }

    /// Translate a URI under the URI root into a local path.
    pub fn uri_to_path(&self, uri: &str) -> Result<PathBuf, MapperError> {
        let mapping = self.require(uri)?;
        if uri == mapping.uri_root {
            return Ok(mapping.path_root.clone());
        }
        let rel = uri
            .strip_prefix(&mapping.uri_prefix())
            .ok_or_else(|| MapperError::UriOutsideRoot {
                uri: uri.to_string(),
                root: mapping.uri_root.clone(),
            })?;

        let mut path = mapping.path_root.clone();
        for segment in rel.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(MapperError::UnsafeSegment {
                    uri: uri.to_string(),
                });
            }
            path.push(segment);
        }
        Ok(path)
    }

    /// Translate a local path under the path root into a URI.
    pub fn path_to_uri(&self, path: &Path) -> Result<String, MapperError> {
        let mapping = self.require(&path.to_string_lossy())?;
        let normalized = normalize_path(path);
        let rel = normalized
            .strip_prefix(&mapping.path_root)
            .map_err(|_| MapperError::PathOutsideRoot {
                path: path.to_path_buf(),
                root: mapping.path_root.clone(),
            })?;

        let segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if segments.is_empty() {
            return Ok(mapping.uri_root.clone());
        }
        Ok(format!("{}{}", mapping.uri_prefix(), segments.join("/")))
    }

    /// Resolve a manifest or source location.
    ///
    /// Absolute URIs and absolute local paths are returned unchanged; a
    /// relative reference is resolved against the URI root.
    pub fn resolve_reference(&self, reference: &str) -> Result<String, MapperError> {
        if has_scheme(reference) || reference.starts_with('/') {
            return Ok(reference.to_string());
        }
        let mapping = self.require(reference)?;
        Ok(format!("{}{}", mapping.uri_prefix(), reference))
    }

    fn require(&self, reference: &str) -> Result<&Mapping, MapperError> {
        self.mapping.as_ref().ok_or_else(|| MapperError::NoMapping {
            reference: reference.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// True if `s` starts with a URI scheme (`http:`, `info:`, `file:` ...).
///
/// Single-letter schemes are not accepted so that `C:\dir` stays a path.
pub fn has_scheme(s: &str) -> bool {
    let Some((scheme, _)) = s.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    scheme.len() >= 2
        && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// The local filesystem location a URI root stands for, if any.
fn local_equivalent(uri_root: &str) -> Option<PathBuf> {
    if !has_scheme(uri_root) {
        return Some(PathBuf::from(uri_root));
    }
    let url = Url::parse(uri_root).ok()?;
    if url.scheme() == "file" {
        url.to_file_path().ok()
    } else {
        None
    }
}

/// Make `path` absolute and resolve `.`/`..` lexically (no symlink lookups).
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
