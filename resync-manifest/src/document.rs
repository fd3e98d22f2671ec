//! Parsed manifest documents.
//!
//! A physical document is either a `urlset` (entries) or a `sitemapindex`
//! (links to component `urlset`s). The typed lists in `resync-core` are the
//! logical view; these structs are what a single document actually said.

use chrono::{DateTime, Utc};

use resync_core::{Capability, ChangeList, Resource, ResourceList};

use crate::error::ManifestError;

/// Root-level `rs:md` metadata shared by both document shapes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Declared capability; `None` when the document has no marker.
    pub capability: Option<Capability>,
    pub at: Option<DateTime<Utc>>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// A `urlset` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlSet {
    pub header: Header,
    pub entries: Vec<Resource>,
}

/// A `sitemapindex` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapIndex {
    pub header: Header,
    pub sitemaps: Vec<String>,
}

/// One parsed physical document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Manifest {
    UrlSet(UrlSet),
    Index(SitemapIndex),
}

impl Manifest {
    /// The capability of the document, inferred from entry shape when the
    /// root carries no marker.
    pub fn kind(&self) -> Capability {
        match self {
            Manifest::UrlSet(set) => set.kind(),
            Manifest::Index(index) => index.header.capability.unwrap_or_default(),
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Manifest::Index(_))
    }

    /// Number of `<url>` or `<sitemap>` entries.
    pub fn len(&self) -> usize {
        match self {
            Manifest::UrlSet(set) => set.entries.len(),
            Manifest::Index(index) => index.sitemaps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UrlSet {
    /// Declared capability, else `changelist` if any entry records a change,
    /// else `resourcelist`.
    pub fn kind(&self) -> Capability {
        self.header.capability.unwrap_or_else(|| {
            if self.entries.iter().any(|r| r.change.is_some()) {
                Capability::ChangeList
            } else {
                Capability::ResourceList
            }
        })
    }

    /// Convert into a [`ResourceList`]; duplicate URIs are an error.
    pub fn into_resource_list(self) -> Result<ResourceList, ManifestError> {
        let mut list = ResourceList::new(self.kind());
        list.at = self.header.at;
        list.from = self.header.from;
        list.until = self.header.until;
        for resource in self.entries {
            list.add(resource)?;
        }
        Ok(list)
    }

    /// Convert into a [`ChangeList`]. Entries without a change datetime fall
    /// back to their `lastmod`; entries with neither are an error.
    pub fn into_change_list(self) -> Result<ChangeList, ManifestError> {
        let mut list = ChangeList::new();
        list.capability = self.kind();
        list.from = self.header.from;
        list.until = self.header.until;
        for mut resource in self.entries {
            if resource.change_datetime.is_none() {
                resource.change_datetime = resource.lastmod;
            }
            list.add(resource)?;
        }
        Ok(list)
    }
}

impl From<&ResourceList> for Header {
    fn from(list: &ResourceList) -> Self {
        Header {
            capability: Some(list.capability),
            at: list.at,
            from: list.from,
            until: list.until,
        }
    }
}

impl From<&ChangeList> for Header {
    fn from(list: &ChangeList) -> Self {
        Header {
            capability: Some(list.capability),
            at: None,
            from: list.from,
            until: list.until,
        }
    }
}

/// Anything that can be written as a manifest.
pub trait ManifestSource {
    fn header(&self) -> Header;
    fn entries(&self) -> &[Resource];
    fn max_entries_per_page(&self) -> usize;
}

impl ManifestSource for ResourceList {
    fn header(&self) -> Header {
        Header::from(self)
    }

    fn entries(&self) -> &[Resource] {
        self.resources()
    }

    fn max_entries_per_page(&self) -> usize {
        self.max_entries_per_page
    }
}

impl ManifestSource for ChangeList {
    fn header(&self) -> Header {
        Header::from(self)
    }

    fn entries(&self) -> &[Resource] {
        self.changes()
    }

    fn max_entries_per_page(&self) -> usize {
        self.max_entries_per_page
    }
}
