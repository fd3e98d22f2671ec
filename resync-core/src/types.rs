//! Domain types for resource synchronization.
//!
//! Every optional field is an explicit `Option`: `None` means "unknown", never
//! "zero" or "empty". Comparison code must treat an unknown field as
//! incomparable rather than equal or unequal.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Default pagination threshold for manifests.
pub const DEFAULT_MAX_ENTRIES_PER_PAGE: usize = 50_000;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The declared role of a manifest document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    #[default]
    ResourceList,
    ResourceDump,
    ChangeList,
    ChangeDump,
    CapabilityList,
    Description,
}

impl Capability {
    pub fn all() -> &'static [Capability] {
        &[
            Capability::ResourceList,
            Capability::ResourceDump,
            Capability::ChangeList,
            Capability::ChangeDump,
            Capability::CapabilityList,
            Capability::Description,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ResourceList => "resourcelist",
            Capability::ResourceDump => "resourcedump",
            Capability::ChangeList => "changelist",
            Capability::ChangeDump => "changedump",
            Capability::CapabilityList => "capabilitylist",
            Capability::Description => "description",
        }
    }

    /// Change lists and change dumps carry per-entry change events.
    pub fn is_change_kind(&self) -> bool {
        matches!(self, Capability::ChangeList | Capability::ChangeDump)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability '{s}'"))
    }
}

/// The kind of change recorded by a change list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ChangeKind::Created),
            "updated" => Ok(ChangeKind::Updated),
            "deleted" => Ok(ChangeKind::Deleted),
            other => Err(format!(
                "unknown change '{other}'; expected: created, updated, deleted"
            )),
        }
    }
}

/// Digest algorithms recognized in `hash` attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HashAlgorithm {
    #[serde(rename = "md5")]
    Md5,
    #[default]
    #[serde(rename = "sha-256")]
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha-256",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha-256" | "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(format!(
                "unsupported hash algorithm '{other}'; expected: md5, sha-256"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// A content digest tagged with its algorithm. Digests are lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: HashAlgorithm,
    pub digest: String,
}

impl Checksum {
    pub fn new(algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        Self {
            algorithm,
            digest: digest.into().to_ascii_lowercase(),
        }
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

impl FromStr for Checksum {
    type Err = String;

    /// Parses a single `algorithm:digest` token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, digest) = s
            .split_once(':')
            .ok_or_else(|| format!("checksum '{s}' is not of the form algorithm:digest"))?;
        if digest.is_empty() {
            return Err(format!("checksum '{s}' has an empty digest"));
        }
        Ok(Checksum::new(algorithm.parse()?, digest))
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

/// One addressable item in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<Checksum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<ChangeKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_datetime: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Capability name of the referenced manifest (capability lists and
    /// source descriptions only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
}

impl Resource {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            lastmod: None,
            length: None,
            checksum: None,
            change: None,
            change_datetime: None,
            mime_type: None,
            capability: None,
        }
    }

    pub fn with_lastmod(mut self, lastmod: DateTime<Utc>) -> Self {
        self.lastmod = Some(lastmod);
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_change(mut self, change: ChangeKind, at: DateTime<Utc>) -> Self {
        self.change = Some(change);
        self.change_datetime = Some(at);
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = Some(capability.into());
        self
    }
}

// ---------------------------------------------------------------------------
// ResourceList
// ---------------------------------------------------------------------------

/// A set of resources keyed by URI, plus list-level metadata.
///
/// Iteration follows insertion order so that serialized manifests are
/// deterministic and caller-supplied order is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceList {
    pub capability: Capability,
    pub at: Option<DateTime<Utc>>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub max_entries_per_page: usize,
    resources: Vec<Resource>,
    index: HashMap<String, usize>,
}

impl Default for ResourceList {
    fn default() -> Self {
        Self::new(Capability::ResourceList)
    }
}

impl ResourceList {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            at: None,
            from: None,
            until: None,
            max_entries_per_page: DEFAULT_MAX_ENTRIES_PER_PAGE,
            resources: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a resource; fails if its URI is already present.
    pub fn add(&mut self, resource: Resource) -> Result<(), ModelError> {
        if self.index.contains_key(&resource.uri) {
            return Err(ModelError::DuplicateUri(resource.uri));
        }
        self.index.insert(resource.uri.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(())
    }

    pub fn get(&self, uri: &str) -> Option<&Resource> {
        self.index.get(uri).map(|&i| &self.resources[i])
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.index.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.resources.iter()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// The algorithm of the first checksum carried by any entry, if any.
    pub fn checksum_algorithm(&self) -> Option<HashAlgorithm> {
        self.resources
            .iter()
            .find_map(|r| r.checksum.as_ref().map(|c| c.algorithm))
    }

    pub fn has_checksums(&self) -> bool {
        self.checksum_algorithm().is_some()
    }
}

impl<'a> IntoIterator for &'a ResourceList {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.resources.iter()
    }
}

// ---------------------------------------------------------------------------
// ChangeList
// ---------------------------------------------------------------------------

/// An event log of changes. Unlike [`ResourceList`], a URI may appear more
/// than once (one entry per event); every entry carries a change kind and
/// a change datetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeList {
    pub capability: Capability,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub max_entries_per_page: usize,
    changes: Vec<Resource>,
}

impl Default for ChangeList {
    fn default() -> Self {
        Self {
            capability: Capability::ChangeList,
            from: None,
            until: None,
            max_entries_per_page: DEFAULT_MAX_ENTRIES_PER_PAGE,
            changes: Vec::new(),
        }
    }
}

impl ChangeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event; the entry must carry both `change` and `change_datetime`.
    pub fn add(&mut self, resource: Resource) -> Result<(), ModelError> {
        if resource.change.is_none() {
            return Err(ModelError::MissingChange { uri: resource.uri });
        }
        if resource.change_datetime.is_none() {
            return Err(ModelError::MissingChangeDatetime { uri: resource.uri });
        }
        self.changes.push(resource);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.changes.iter()
    }

    pub fn changes(&self) -> &[Resource] {
        &self.changes
    }

    /// Sort entries by change datetime. The sort is stable, so events with
    /// equal datetimes keep their listed order.
    pub fn sort(&mut self) {
        self.changes.sort_by_key(|r| r.change_datetime);
    }

    /// Drop events strictly before `from`; returns how many were dropped.
    pub fn prune_before(&mut self, from: DateTime<Utc>) -> usize {
        let before = self.changes.len();
        self.changes
            .retain(|r| r.change_datetime.map(|t| t >= from).unwrap_or(true));
        before - self.changes.len()
    }

    /// Keep only the latest event per URI; returns how many were dropped.
    ///
    /// Sorts first, so the survivor is the event with the greatest change
    /// datetime (the one listed last on ties).
    pub fn prune_superseded(&mut self) -> usize {
        self.sort();
        let mut last: HashMap<&str, usize> = HashMap::new();
        for (i, r) in self.changes.iter().enumerate() {
            last.insert(r.uri.as_str(), i);
        }
        let keep: Vec<bool> = (0..self.changes.len())
            .map(|i| last.get(self.changes[i].uri.as_str()) == Some(&i))
            .collect();
        let before = self.changes.len();
        let mut flags = keep.into_iter();
        self.changes.retain(|_| flags.next().unwrap_or(false));
        before - self.changes.len()
    }

    /// Count entries by change kind: `(created, updated, deleted)`.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.changes
            .iter()
            .fold((0, 0, 0), |(c, u, d), r| match r.change {
                Some(ChangeKind::Created) => (c + 1, u, d),
                Some(ChangeKind::Updated) => (c, u + 1, d),
                Some(ChangeKind::Deleted) => (c, u, d + 1),
                None => (c, u, d),
            })
    }

    /// Latest change datetime across all entries.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.changes.iter().filter_map(|r| r.change_datetime).max()
    }
}

impl<'a> IntoIterator for &'a ChangeList {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn capability_display_and_parse() {
        for cap in Capability::all() {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), *cap);
        }
        assert!("sitemap".parse::<Capability>().is_err());
    }

    #[test]
    fn checksum_parse_lowercases_digest() {
        let c: Checksum = "MD5:ABCDEF".parse().unwrap();
        assert_eq!(c.algorithm, HashAlgorithm::Md5);
        assert_eq!(c.digest, "abcdef");
        assert_eq!(c.to_string(), "md5:abcdef");
        assert!("sha-1:abc".parse::<Checksum>().is_err());
        assert!("md5:".parse::<Checksum>().is_err());
    }

    #[test]
    fn resource_list_rejects_duplicate_uri() {
        let mut rl = ResourceList::default();
        rl.add(Resource::new("http://ex.org/a")).unwrap();
        let err = rl.add(Resource::new("http://ex.org/a")).unwrap_err();
        assert_eq!(err, ModelError::DuplicateUri("http://ex.org/a".into()));
        assert_eq!(rl.len(), 1);
    }

    #[test]
    fn resource_list_preserves_insertion_order() {
        let mut rl = ResourceList::new(Capability::CapabilityList);
        for uri in ["z", "a", "m"] {
            rl.add(Resource::new(uri)).unwrap();
        }
        let uris: Vec<_> = rl.iter().map(|r| r.uri.as_str()).collect();
        assert_eq!(uris, ["z", "a", "m"]);
        assert!(rl.contains("a"));
        assert!(rl.get("q").is_none());
    }

    #[test]
    fn checksum_algorithm_reports_first_present() {
        let mut rl = ResourceList::default();
        rl.add(Resource::new("a")).unwrap();
        assert!(!rl.has_checksums());
        rl.add(Resource::new("b").with_checksum(Checksum::new(HashAlgorithm::Md5, "00")))
            .unwrap();
        assert_eq!(rl.checksum_algorithm(), Some(HashAlgorithm::Md5));
    }

    #[test]
    fn change_list_requires_change_fields() {
        let mut cl = ChangeList::new();
        assert!(matches!(
            cl.add(Resource::new("u")),
            Err(ModelError::MissingChange { .. })
        ));
        let mut missing_dt = Resource::new("u");
        missing_dt.change = Some(ChangeKind::Created);
        assert!(matches!(
            cl.add(missing_dt),
            Err(ModelError::MissingChangeDatetime { .. })
        ));
        assert!(cl.is_empty());
    }

    #[test]
    fn prune_superseded_keeps_latest_by_datetime_not_position() {
        let mut cl = ChangeList::new();
        cl.add(Resource::new("u").with_change(ChangeKind::Deleted, ts(20)))
            .unwrap();
        cl.add(Resource::new("u").with_change(ChangeKind::Updated, ts(10)))
            .unwrap();
        cl.add(Resource::new("v").with_change(ChangeKind::Created, ts(5)))
            .unwrap();

        assert_eq!(cl.prune_superseded(), 1);
        let kinds: Vec<_> = cl.iter().map(|r| (r.uri.as_str(), r.change)).collect();
        assert_eq!(
            kinds,
            [("v", Some(ChangeKind::Created)), ("u", Some(ChangeKind::Deleted))]
        );
    }

    #[test]
    fn prune_before_and_counts() {
        let mut cl = ChangeList::new();
        cl.add(Resource::new("a").with_change(ChangeKind::Created, ts(1)))
            .unwrap();
        cl.add(Resource::new("b").with_change(ChangeKind::Updated, ts(5)))
            .unwrap();
        cl.add(Resource::new("c").with_change(ChangeKind::Deleted, ts(9)))
            .unwrap();

        assert_eq!(cl.prune_before(ts(5)), 1);
        assert_eq!(cl.counts(), (0, 1, 1));
        assert_eq!(cl.latest(), Some(ts(9)));
    }
}
