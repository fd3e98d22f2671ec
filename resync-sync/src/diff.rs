//! Classify resources of a source list against a destination list.

use resync_core::{Resource, ResourceList};

/// Timestamps closer than this are equal; manifests carry second precision.
pub const LASTMOD_TOLERANCE_MS: i64 = 1_000;

/// Result of comparing two lists. Each URI lands in exactly one set.
///
/// `same`, `created` and `updated` follow source order; `deleted` follows
/// destination order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub same: Vec<Resource>,
    pub created: Vec<Resource>,
    pub updated: Vec<Resource>,
    pub deleted: Vec<Resource>,
}

impl Delta {
    pub fn in_sync(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn total(&self) -> usize {
        self.same.len() + self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// Compare `source` with `dest`.
///
/// With `checksum` set, a URI whose two sides carry digests of the same
/// algorithm is decided by digest alone. Otherwise `lastmod` and `length`
/// are compared where both sides know them.
pub fn diff(source: &ResourceList, dest: &ResourceList, checksum: bool) -> Delta {
    let mut delta = Delta::default();
    for src in source {
        match dest.get(&src.uri) {
            None => delta.created.push(src.clone()),
            Some(dst) if is_same(src, dst, checksum) => delta.same.push(src.clone()),
            Some(_) => delta.updated.push(src.clone()),
        }
    }
    delta.deleted = dest
        .iter()
        .filter(|dst| !source.contains(&dst.uri))
        .cloned()
        .collect();
    delta
}

/// Whether `dst` already matches `src`.
///
/// Unknown fields are skipped rather than treated as equal or unequal; a
/// pair with no comparable field at all is not the same.
pub fn is_same(src: &Resource, dst: &Resource, checksum: bool) -> bool {
    if checksum {
        if let (Some(a), Some(b)) = (&src.checksum, &dst.checksum) {
            if a.algorithm == b.algorithm {
                return a.digest == b.digest;
            }
        }
    }

    let mut compared = false;
    if let (Some(a), Some(b)) = (src.lastmod, dst.lastmod) {
        if (a - b).num_milliseconds().abs() >= LASTMOD_TOLERANCE_MS {
            return false;
        }
        compared = true;
    }
    if let (Some(a), Some(b)) = (src.length, dst.length) {
        if a != b {
            return false;
        }
        compared = true;
    }
    if !compared {
        tracing::debug!(uri = %src.uri, "no comparable metadata, treating as updated");
    }
    compared
}
