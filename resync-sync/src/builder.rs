//! Build a [`ResourceList`] by scanning local files.
//!
//! Only regular files are listed and symlinks are not followed. By default
//! any entry whose name starts with `.` is skipped along with everything
//! beneath it. A destination scan uses [`ResourceListBuilder::include_hidden`]
//! so that dotfiles named by a source are seen once downloaded; in-progress
//! transfer files are skipped either way.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use md5::Md5;
use sha2::{Digest, Sha256};
use walkdir::{DirEntry, WalkDir};

use resync_core::{Checksum, HashAlgorithm, Mapper, MapperError, Resource, ResourceList};

use crate::error::{io_err, SyncError};

pub struct ResourceListBuilder<'a> {
    mapper: &'a Mapper,
    checksum: Option<HashAlgorithm>,
    max_entries_per_page: Option<usize>,
    include_hidden: bool,
}

impl<'a> ResourceListBuilder<'a> {
    pub fn new(mapper: &'a Mapper) -> Self {
        Self {
            mapper,
            checksum: None,
            max_entries_per_page: None,
            include_hidden: false,
        }
    }

    /// Compute a digest for every file with `algorithm`; `None` skips it.
    pub fn checksum(mut self, algorithm: Option<HashAlgorithm>) -> Self {
        self.checksum = algorithm;
        self
    }

    pub fn max_entries_per_page(mut self, max: usize) -> Self {
        self.max_entries_per_page = Some(max);
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Scan `paths`, or the mapped path root when `None`.
    ///
    /// Missing roots contribute nothing; an empty result is not an error.
    pub fn build(&self, paths: Option<&[PathBuf]>) -> Result<ResourceList, SyncError> {
        let mapping = self.mapper.mapping().ok_or_else(|| MapperError::NoMapping {
            reference: "resource list scan".to_string(),
        })?;
        let roots: Vec<PathBuf> = match paths {
            Some(paths) => paths.to_vec(),
            None => vec![mapping.path_root().to_path_buf()],
        };

        let mut list = ResourceList::default();
        list.at = Some(Utc::now());
        if let Some(max) = self.max_entries_per_page {
            list.max_entries_per_page = max;
        }

        for root in &roots {
            if !root.exists() {
                tracing::debug!(path = %root.display(), "scan root does not exist");
                continue;
            }
            let walker = WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || self.keep(e));
            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping unreadable entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let uri = self.mapper.path_to_uri(entry.path())?;
                if list.contains(&uri) {
                    continue;
                }
                let resource = describe_file(entry.path(), uri, self.checksum)?;
                list.add(resource)?;
            }
        }
        tracing::debug!(resources = list.len(), "scanned local resources");
        Ok(list)
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        let Some(name) = entry.file_name().to_str() else {
            return true;
        };
        if !name.starts_with('.') {
            return true;
        }
        self.include_hidden && !name.ends_with(TRANSFER_SUFFIX)
    }
}

/// Suffix of the temporary file a download is streamed into.
pub(crate) const TRANSFER_SUFFIX: &str = ".resync.tmp";

/// Describe one local file as a resource with URI `uri`.
pub fn describe_file(
    path: &Path,
    uri: String,
    checksum: Option<HashAlgorithm>,
) -> Result<Resource, SyncError> {
    let meta = std::fs::metadata(path).map_err(|e| io_err(path, e))?;
    let mut resource = Resource::new(uri).with_length(meta.len());
    if let Ok(modified) = meta.modified() {
        resource.lastmod = Some(DateTime::<Utc>::from(modified));
    }
    if let Some(algorithm) = checksum {
        resource.checksum = Some(file_checksum(path, algorithm)?);
    }
    Ok(resource)
}

/// Digest of a file's bytes.
pub fn file_checksum(path: &Path, algorithm: HashAlgorithm) -> Result<Checksum, SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let digest = match algorithm {
        HashAlgorithm::Md5 => digest_reader::<Md5>(&mut file),
        HashAlgorithm::Sha256 => digest_reader::<Sha256>(&mut file),
    }
    .map_err(|e| io_err(path, e))?;
    Ok(Checksum::new(algorithm, digest))
}

fn digest_reader<D: Digest>(reader: &mut impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
