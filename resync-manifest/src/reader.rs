//! Sitemap XML reader.
//!
//! Element names are matched on their local part, so documents using a
//! different prefix for the ResourceSync namespace still parse.

use std::collections::HashSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use resync_core::{Capability, ChangeKind, Checksum, Resource};

use crate::datetime;
use crate::document::{Header, Manifest, SitemapIndex, UrlSet};
use crate::error::{BoxError, ManifestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    UrlSet,
    Index,
}

/// Parse one physical document.
pub fn parse(bytes: &[u8]) -> Result<Manifest, ManifestError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut root: Option<Root> = None;
    let mut header = Header::default();
    let mut stack: Vec<String> = Vec::new();
    let mut entry: Option<Resource> = None;
    let mut entry_has_loc = false;
    let mut entries: Vec<Resource> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = local_name(&e);
                if stack.is_empty() {
                    root = Some(parse_root(&name)?);
                } else if is_entry(&name) && stack.len() == 1 {
                    entry = Some(Resource::new(String::new()));
                    entry_has_loc = false;
                } else if name == "md" {
                    apply_md(&e, stack.len(), entry.as_mut(), &mut header)?;
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if stack.is_empty() {
                    root = Some(parse_root(&name)?);
                } else if name == "md" {
                    apply_md(&e, stack.len(), entry.as_mut(), &mut header)?;
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?.into_owned();
                apply_text(&stack, &text, entry.as_mut(), &mut entry_has_loc)?;
            }
            Event::CData(t) => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                apply_text(&stack, &text, entry.as_mut(), &mut entry_has_loc)?;
            }
            Event::End(_) => {
                if let Some(name) = stack.pop() {
                    if is_entry(&name) && stack.len() == 1 {
                        let finished = entry.take().ok_or(ManifestError::MissingLoc)?;
                        if !entry_has_loc {
                            return Err(ManifestError::MissingLoc);
                        }
                        entries.push(finished);
                    }
                }
            }
            Event::Eof => {
                if let Some(open) = stack.pop() {
                    return Err(ManifestError::Truncated(open));
                }
                break;
            }
            _ => {}
        }
    }

    match root {
        Some(Root::UrlSet) => Ok(Manifest::UrlSet(UrlSet { header, entries })),
        Some(Root::Index) => Ok(Manifest::Index(SitemapIndex {
            header,
            sitemaps: entries.into_iter().map(|r| r.uri).collect(),
        })),
        None => Err(ManifestError::UnexpectedRoot(String::new())),
    }
}

/// Read the document at `location` with `fetch`, following a sitemap index
/// into its components and merging them into one logical `urlset`.
///
/// Relative component locations are resolved against the index location.
pub fn read_with<F>(location: &str, mut fetch: F) -> Result<UrlSet, ManifestError>
where
    F: FnMut(&str) -> Result<Vec<u8>, BoxError>,
{
    let bytes = fetch(location).map_err(|source| ManifestError::Fetch {
        location: location.to_string(),
        source,
    })?;
    let index = match parse(&bytes)? {
        Manifest::UrlSet(set) => return Ok(set),
        Manifest::Index(index) => index,
    };

    tracing::debug!(
        location,
        components = index.sitemaps.len(),
        "following sitemap index"
    );
    let mut merged = UrlSet {
        header: index.header.clone(),
        entries: Vec::new(),
    };
    let mut seen = HashSet::new();
    for component in &index.sitemaps {
        let component = resolve_component(location, component);
        if !seen.insert(component.clone()) {
            continue;
        }
        let bytes = fetch(&component).map_err(|source| ManifestError::Fetch {
            location: component.clone(),
            source,
        })?;
        match parse(&bytes)? {
            Manifest::UrlSet(part) => {
                if merged.header.capability.is_none() {
                    merged.header.capability = part.header.capability;
                }
                merged.entries.extend(part.entries);
            }
            Manifest::Index(_) => {
                return Err(ManifestError::NestedIndex {
                    location: component,
                })
            }
        }
    }
    Ok(merged)
}

fn resolve_component(index_location: &str, component: &str) -> String {
    if component.starts_with('/') || component.contains(':') {
        return component.to_string();
    }
    match index_location.rfind('/') {
        Some(pos) => format!("{}{}", &index_location[..=pos], component),
        None => component.to_string(),
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn is_entry(name: &str) -> bool {
    name == "url" || name == "sitemap"
}

fn parse_root(name: &str) -> Result<Root, ManifestError> {
    match name {
        "urlset" => Ok(Root::UrlSet),
        "sitemapindex" => Ok(Root::Index),
        other => Err(ManifestError::UnexpectedRoot(other.to_string())),
    }
}

fn apply_text(
    stack: &[String],
    text: &str,
    entry: Option<&mut Resource>,
    has_loc: &mut bool,
) -> Result<(), ManifestError> {
    let (Some(field), Some(entry)) = (stack.last(), entry) else {
        return Ok(());
    };
    match field.as_str() {
        "loc" => {
            entry.uri = text.trim().to_string();
            *has_loc = !entry.uri.is_empty();
        }
        "lastmod" => entry.lastmod = Some(datetime::parse(text)?),
        _ => {}
    }
    Ok(())
}

/// Apply an `rs:md` element: at depth 1 it describes the list, inside an
/// entry it describes that entry.
fn apply_md(
    e: &BytesStart<'_>,
    depth: usize,
    entry: Option<&mut Resource>,
    header: &mut Header,
) -> Result<(), ManifestError> {
    match entry {
        Some(resource) if depth >= 2 => apply_entry_md(e, resource),
        None if depth == 1 => apply_header_md(e, header),
        _ => Ok(()),
    }
}

fn apply_header_md(e: &BytesStart<'_>, header: &mut Header) -> Result<(), ManifestError> {
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"capability" => {
                let capability = value
                    .parse::<Capability>()
                    .map_err(|_| ManifestError::UnknownCapability(value.clone()))?;
                header.capability = Some(capability);
            }
            b"at" => header.at = Some(datetime::parse(&value)?),
            b"from" => header.from = Some(datetime::parse(&value)?),
            b"until" => header.until = Some(datetime::parse(&value)?),
            _ => {}
        }
    }
    Ok(())
}

fn apply_entry_md(e: &BytesStart<'_>, resource: &mut Resource) -> Result<(), ManifestError> {
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?.into_owned();
        match attr.key.local_name().as_ref() {
            b"capability" => resource.capability = Some(value),
            b"change" => {
                let change = value
                    .parse::<ChangeKind>()
                    .map_err(|reason| ManifestError::BadAttribute {
                        name: "change".to_string(),
                        reason,
                    })?;
                resource.change = Some(change);
            }
            b"datetime" => resource.change_datetime = Some(datetime::parse(&value)?),
            b"hash" => resource.checksum = parse_hash(&value),
            b"length" => {
                let length = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ManifestError::BadAttribute {
                        name: "length".to_string(),
                        reason: e.to_string(),
                    })?;
                resource.length = Some(length);
            }
            b"type" => resource.mime_type = Some(value),
            _ => {}
        }
    }
    Ok(())
}

/// First recognized token of a space-separated `hash` attribute.
fn parse_hash(value: &str) -> Option<Checksum> {
    value.split_whitespace().find_map(|token| match token.parse::<Checksum>() {
        Ok(checksum) => Some(checksum),
        Err(reason) => {
            tracing::debug!(token, %reason, "skipping unrecognized hash");
            None
        }
    })
}
