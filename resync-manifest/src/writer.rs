//! Sitemap XML writer.
//!
//! Output is compact (no indentation) and deterministic: root `rs:md`
//! attributes are written in the order `at`, `capability`, `from`, `until`;
//! entry `rs:md` attributes in the order `capability`, `change`, `datetime`,
//! `hash`, `length`, `type`. Absent fields are omitted.

use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use resync_core::Resource;

use crate::datetime;
use crate::document::{Header, ManifestSource};
use crate::error::{io_err, ManifestError};

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
pub const RS_NS: &str = "http://www.openarchives.org/rs/terms/";

/// Write `source` as a single `urlset` document.
///
/// Fails with [`ManifestError::TooManyEntries`] when the source holds more
/// entries than its page limit; use [`write_paginated`] for those.
pub fn write<M, W>(source: &M, out: W) -> Result<(), ManifestError>
where
    M: ManifestSource + ?Sized,
    W: Write,
{
    let entries = source.entries();
    let max = source.max_entries_per_page();
    if max > 0 && entries.len() > max {
        return Err(ManifestError::TooManyEntries {
            count: entries.len(),
            max,
        });
    }
    write_urlset(&source.header(), entries, out)
}

/// [`write`] into a `String`.
pub fn to_string<M>(source: &M) -> Result<String, ManifestError>
where
    M: ManifestSource + ?Sized,
{
    let mut buf = Vec::new();
    write(source, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write a `sitemapindex` document listing `sitemaps`.
pub fn write_index<W: Write>(header: &Header, sitemaps: &[String], out: W) -> Result<(), ManifestError> {
    let mut w = Writer::new(out);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.write_event(Event::Start(root_start("sitemapindex")))?;
    write_header(&mut w, header)?;
    for loc in sitemaps {
        w.write_event(Event::Start(BytesStart::new("sitemap")))?;
        write_text_element(&mut w, "loc", loc)?;
        w.write_event(Event::End(BytesEnd::new("sitemap")))?;
    }
    w.write_event(Event::End(BytesEnd::new("sitemapindex")))?;
    Ok(())
}

/// Write `source` to `path`, splitting it across component files when it
/// exceeds its page limit.
///
/// A source within the limit produces the single file `path`. Otherwise the
/// entries are written to `<stem>00000.xml`, `<stem>00001.xml`, ... beside
/// `path`, and `path` itself becomes a `sitemapindex` whose `<loc>` for each
/// component is `uri_for(component_path)`. A page limit of zero means no limit.
///
/// Returns the written files, components first.
pub fn write_paginated<M, F>(source: &M, path: &Path, uri_for: F) -> Result<Vec<PathBuf>, ManifestError>
where
    M: ManifestSource + ?Sized,
    F: Fn(&Path) -> String,
{
    let entries = source.entries();
    let header = source.header();
    let max = source.max_entries_per_page();

    if max == 0 || entries.len() <= max {
        let mut buf = Vec::new();
        write_urlset(&header, entries, &mut buf)?;
        write_atomic(path, &buf)?;
        return Ok(vec![path.to_path_buf()]);
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut written = Vec::new();
    let mut locations = Vec::new();
    for (n, chunk) in entries.chunks(max).enumerate() {
        let component = dir.join(format!("{stem}{n:05}.xml"));
        let mut buf = Vec::new();
        write_urlset(&header, chunk, &mut buf)?;
        write_atomic(&component, &buf)?;
        locations.push(uri_for(&component));
        written.push(component);
    }

    let index_header = Header {
        from: None,
        until: None,
        ..header
    };
    let mut buf = Vec::new();
    write_index(&index_header, &locations, &mut buf)?;
    write_atomic(path, &buf)?;
    written.push(path.to_path_buf());

    tracing::debug!(
        path = %path.display(),
        pages = locations.len(),
        "wrote paginated manifest"
    );
    Ok(written)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn write_urlset<W: Write>(header: &Header, entries: &[Resource], out: W) -> Result<(), ManifestError> {
    let mut w = Writer::new(out);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.write_event(Event::Start(root_start("urlset")))?;
    write_header(&mut w, header)?;
    for resource in entries {
        write_entry(&mut w, resource)?;
    }
    w.write_event(Event::End(BytesEnd::new("urlset")))?;
    Ok(())
}

fn root_start(name: &str) -> BytesStart<'_> {
    BytesStart::new(name).with_attributes([("xmlns", SITEMAP_NS), ("xmlns:rs", RS_NS)])
}

fn write_header<W: Write>(w: &mut Writer<W>, header: &Header) -> Result<(), ManifestError> {
    let mut md = BytesStart::new("rs:md");
    if let Some(at) = &header.at {
        md.push_attribute(("at", datetime::format(at).as_str()));
    }
    if let Some(capability) = &header.capability {
        md.push_attribute(("capability", capability.as_str()));
    }
    if let Some(from) = &header.from {
        md.push_attribute(("from", datetime::format(from).as_str()));
    }
    if let Some(until) = &header.until {
        md.push_attribute(("until", datetime::format(until).as_str()));
    }
    w.write_event(Event::Empty(md))?;
    Ok(())
}

fn write_entry<W: Write>(w: &mut Writer<W>, resource: &Resource) -> Result<(), ManifestError> {
    w.write_event(Event::Start(BytesStart::new("url")))?;
    write_text_element(w, "loc", &resource.uri)?;
    if let Some(lastmod) = &resource.lastmod {
        write_text_element(w, "lastmod", &datetime::format(lastmod))?;
    }

    let mut attrs: Vec<(&str, String)> = Vec::new();
    if let Some(capability) = &resource.capability {
        attrs.push(("capability", capability.clone()));
    }
    if let Some(change) = resource.change {
        attrs.push(("change", change.to_string()));
    }
    if let Some(dt) = &resource.change_datetime {
        attrs.push(("datetime", datetime::format(dt)));
    }
    if let Some(checksum) = &resource.checksum {
        attrs.push(("hash", checksum.to_string()));
    }
    if let Some(length) = resource.length {
        attrs.push(("length", length.to_string()));
    }
    if let Some(mime) = &resource.mime_type {
        attrs.push(("type", mime.clone()));
    }
    if !attrs.is_empty() {
        let md = BytesStart::new("rs:md")
            .with_attributes(attrs.iter().map(|(k, v)| (*k, v.as_str())));
        w.write_event(Event::Empty(md))?;
    }

    w.write_event(Event::End(BytesEnd::new("url")))?;
    Ok(())
}

fn write_text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<(), ManifestError> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Write to `<path>.tmp` then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use resync_core::{Capability, ChangeKind, ChangeList, Checksum, HashAlgorithm, ResourceList};

    #[test]
    fn resource_list_root_and_entry_markup() {
        let mut rl = ResourceList::default();
        rl.at = Some(Utc.with_ymd_and_hms(2013, 1, 3, 9, 0, 0).unwrap());
        rl.add(
            Resource::new("http://ex.org/a&b")
                .with_lastmod(Utc.with_ymd_and_hms(2013, 1, 2, 13, 0, 0).unwrap())
                .with_length(12)
                .with_checksum(Checksum::new(HashAlgorithm::Md5, "ABCD")),
        )
        .unwrap();

        let xml = to_string(&rl).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(r#"<rs:md at="2013-01-03T09:00:00Z" capability="resourcelist"/>"#));
        assert!(xml.contains("<loc>http://ex.org/a&amp;b</loc>"));
        assert!(xml.contains("<lastmod>2013-01-02T13:00:00Z</lastmod>"));
        assert!(xml.contains(r#"<rs:md hash="md5:abcd" length="12"/>"#));
    }

    #[test]
    fn change_entry_carries_change_and_datetime() {
        let mut cl = ChangeList::new();
        cl.add(Resource::new("http://ex.org/x").with_change(
            ChangeKind::Deleted,
            Utc.with_ymd_and_hms(2013, 1, 2, 18, 0, 0).unwrap(),
        ))
        .unwrap();
        let xml = to_string(&cl).unwrap();
        assert!(xml.contains(r#"capability="changelist""#));
        assert!(xml.contains(r#"<rs:md change="deleted" datetime="2013-01-02T18:00:00Z"/>"#));
    }

    #[test]
    fn entry_without_metadata_has_no_md_element() {
        let mut rl = ResourceList::new(Capability::CapabilityList);
        rl.add(Resource::new("u")).unwrap();
        let xml = to_string(&rl).unwrap();
        assert!(xml.contains("<url><loc>u</loc></url>"));
    }

    #[test]
    fn oversized_list_needs_pagination() {
        let mut rl = ResourceList::default();
        rl.max_entries_per_page = 1;
        rl.add(Resource::new("a")).unwrap();
        rl.add(Resource::new("b")).unwrap();
        let err = to_string(&rl).unwrap_err();
        assert!(matches!(err, ManifestError::TooManyEntries { count: 2, max: 1 }));
    }
}
