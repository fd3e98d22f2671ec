//! Capability lists and source descriptions.
//!
//! Both are pure formatting: entries keep caller order and nothing touches
//! the network or the filesystem.

use std::io::Write;

use resync_core::{Capability, Resource, ResourceList};

use crate::error::SyncError;

/// A `capabilitylist` with one `(uri, capability=name)` entry per pair.
pub fn capability_list<I, N, U>(capabilities: I) -> Result<ResourceList, SyncError>
where
    I: IntoIterator<Item = (N, U)>,
    N: Into<String>,
    U: Into<String>,
{
    let mut list = ResourceList::new(Capability::CapabilityList);
    for (name, uri) in capabilities {
        list.add(Resource::new(uri).with_capability(name))?;
    }
    Ok(list)
}

/// A `description` with one `(uri, capability=capabilitylist)` entry per URI.
pub fn source_description<I, U>(capability_lists: I) -> Result<ResourceList, SyncError>
where
    I: IntoIterator<Item = U>,
    U: Into<String>,
{
    let mut list = ResourceList::new(Capability::Description);
    for uri in capability_lists {
        list.add(Resource::new(uri).with_capability(Capability::CapabilityList.as_str()))?;
    }
    Ok(list)
}

pub fn write_capability_list<I, N, U>(capabilities: I, out: impl Write) -> Result<(), SyncError>
where
    I: IntoIterator<Item = (N, U)>,
    N: Into<String>,
    U: Into<String>,
{
    resync_manifest::write(&capability_list(capabilities)?, out)?;
    Ok(())
}

pub fn write_source_description<I, U>(capability_lists: I, out: impl Write) -> Result<(), SyncError>
where
    I: IntoIterator<Item = U>,
    U: Into<String>,
{
    resync_manifest::write(&source_description(capability_lists)?, out)?;
    Ok(())
}
