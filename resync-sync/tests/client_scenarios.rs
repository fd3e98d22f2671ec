//! End-to-end client runs against a mirrored source site.
//!
//! The source is a directory holding files plus the manifests describing
//! them; `MirrorTransport` serves it as `http://example.org/`.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rstest::rstest;
use tempfile::TempDir;

use resync_core::{ChangeKind, ChangeList, Checksum, HashAlgorithm, Resource, ResourceList, SyncConfig};
use resync_sync::{Client, FatalError, MemorySink, MirrorTransport, SyncError};

const ROOT: &str = "http://example.org/";

fn ts(value: &str) -> DateTime<Utc> {
    resync_manifest::datetime::parse(value).unwrap()
}

struct Site {
    src: TempDir,
    dst: TempDir,
    home: TempDir,
}

impl Site {
    fn new() -> Self {
        Self {
            src: TempDir::new().unwrap(),
            dst: TempDir::new().unwrap(),
            home: TempDir::new().unwrap(),
        }
    }

    fn client(&self, config: SyncConfig) -> (Client, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let mut client = Client::new(config)
            .with_transport(Arc::new(MirrorTransport::new(ROOT, self.src.path())))
            .with_sink(sink.clone())
            .with_state_home(self.home.path());
        client.set_mapping(ROOT, self.dst.path()).unwrap();
        (client, sink)
    }

    /// Write source files and a resource list describing them.
    fn publish(&self, files: &[(&str, &str, &str)]) {
        self.publish_with(files, None)
    }

    fn publish_with(&self, files: &[(&str, &str, &str)], hash: Option<HashAlgorithm>) {
        let mut rl = ResourceList::default();
        rl.at = Some(ts("2015-01-01T00:00:00Z"));
        for (name, content, lastmod) in files {
            std::fs::write(self.src.path().join(name), content).unwrap();
            let mut r = Resource::new(format!("{ROOT}{name}"))
                .with_lastmod(ts(lastmod))
                .with_length(content.len() as u64);
            if let Some(alg) = hash {
                r = r.with_checksum(digest(alg, content));
            }
            rl.add(r).unwrap();
        }
        self.write_manifest("resourcelist.xml", &resync_manifest::to_string(&rl).unwrap());
    }

    fn publish_changes(&self, changes: &[(&str, ChangeKind, &str, Option<&str>)]) {
        let mut cl = ChangeList::new();
        for (name, kind, at, content) in changes {
            let mut r = Resource::new(format!("{ROOT}{name}")).with_change(*kind, ts(at));
            if let Some(content) = content {
                std::fs::write(self.src.path().join(name), content).unwrap();
                r = r.with_lastmod(ts(at)).with_length(content.len() as u64);
            }
            cl.add(r).unwrap();
        }
        self.write_manifest("changelist.xml", &resync_manifest::to_string(&cl).unwrap());
    }

    fn write_manifest(&self, name: &str, xml: &str) {
        std::fs::write(self.src.path().join(name), xml).unwrap();
    }

    fn dst_file(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.dst.path().join(name)).ok()
    }
}

fn digest(alg: HashAlgorithm, content: &str) -> Checksum {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("f");
    std::fs::write(&path, content).unwrap();
    resync_sync::builder::file_checksum(&path, alg).unwrap()
}

fn set_mtime(path: &Path, at: DateTime<Utc>) {
    filetime::set_file_mtime(path, filetime::FileTime::from_unix_time(at.timestamp(), 0)).unwrap();
}

// ---------------------------------------------------------------------------
// 1. Baseline scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_first_baseline_creates_everything() {
    let site = Site::new();
    site.publish(&[
        ("a", "file a", "2015-01-01T00:00:01Z"),
        ("b", "file bb", "2015-01-01T00:00:02Z"),
        ("c", "file ccc", "2015-01-01T00:00:03Z"),
    ]);
    let (mut client, sink) = site.client(SyncConfig::default());

    let summary = client.baseline(false).unwrap();
    assert_eq!((summary.same, summary.created, summary.updated, summary.deleted), (0, 3, 0, 0));
    assert!(sink.contains("Status: NOT IN SYNC (same=0, to create=3, to update=0, to delete=0)"));
    assert!(sink.contains("Status: SYNCED (same=0, created=3, updated=0, deleted=0)"));
    assert_eq!(site.dst_file("a").as_deref(), Some("file a"));
    assert_eq!(site.dst_file("c").as_deref(), Some("file ccc"));
}

#[test]
fn scenario_b_then_c_baseline_with_deletion_then_incremental() {
    let site = Site::new();
    site.publish(&[
        ("a", "file a", "2015-01-01T00:00:01Z"),
        ("b", "file bb", "2015-01-01T00:00:02Z"),
        ("c", "file ccc", "2015-01-01T00:00:03Z"),
    ]);
    let (mut client, sink) = site.client(SyncConfig::default());
    client.baseline(false).unwrap();
    sink.clear();

    // B: a unchanged, b updated, c removed, d added.
    std::fs::remove_file(site.src.path().join("c")).unwrap();
    site.publish(&[
        ("a", "file a", "2015-01-01T00:00:01Z"),
        ("b", "file b changed", "2015-01-01T00:10:00Z"),
        ("d", "file d", "2015-01-01T00:10:00Z"),
    ]);
    let summary = client.baseline(true).unwrap();
    assert!(sink.contains("Status: SYNCED (same=1, created=1, updated=1, deleted=1)"));
    assert_eq!(summary.failed(), 0);
    assert_eq!(site.dst_file("b").as_deref(), Some("file b changed"));
    assert_eq!(site.dst_file("c"), None);
    assert_eq!(site.dst_file("d").as_deref(), Some("file d"));
    sink.clear();

    // C: one change after the start point, one before it.
    site.publish_changes(&[
        ("old", ChangeKind::Created, "2014-12-31T00:00:00Z", Some("stale")),
        ("e", ChangeKind::Created, "2015-01-01T02:00:00Z", Some("file e")),
    ]);
    let summary = client.incremental(Some("2015-01-01T01:01:01Z")).unwrap();
    assert!(sink.contains("Read source change list, 1 changes listed"));
    assert!(sink.contains("Status: CHANGES APPLIED (created=1, updated=0, deleted=0)"));
    assert_eq!(summary.changes_listed, 1);
    assert_eq!(site.dst_file("e").as_deref(), Some("file e"));
    assert_eq!(site.dst_file("old"), None);
}

#[test]
fn rerunning_baseline_and_audit_is_idempotent() {
    let site = Site::new();
    site.publish(&[
        ("a", "file a", "2015-01-01T00:00:01Z"),
        ("b", "file bb", "2015-01-01T00:00:02Z"),
    ]);
    let (mut client, sink) = site.client(SyncConfig::default());
    client.baseline(false).unwrap();
    sink.clear();

    let again = client.baseline(false).unwrap();
    assert_eq!((again.same, again.created, again.updated, again.deleted), (2, 0, 0, 0));
    assert!(sink.contains("Status: IN SYNC (same=2, to create=0, to update=0, to delete=0)"));

    let audit = client.audit().unwrap();
    assert_eq!((audit.created, audit.updated, audit.deleted), (0, 0, 0));
}

#[test]
fn deletion_off_leaves_extra_files_and_reports_them() {
    let site = Site::new();
    site.publish(&[("a", "file a", "2015-01-01T00:00:01Z")]);
    std::fs::write(site.dst.path().join("extra"), "keep me").unwrap();
    let (mut client, sink) = site.client(SyncConfig::default());

    let summary = client.baseline(false).unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.not_deleted, 1);
    assert!(site.dst.path().join("extra").exists());
    assert!(sink.contains("Status: NOT IN SYNC (same=0, created=1, updated=0, deleted=0, not deleted=1)"));
}

#[test]
fn audit_changes_nothing() {
    let site = Site::new();
    site.publish(&[("a", "file a", "2015-01-01T00:00:01Z")]);
    let (mut client, sink) = site.client(SyncConfig::default());
    let summary = client.audit().unwrap();
    assert_eq!(summary.created, 1);
    assert!(sink.contains("Status: NOT IN SYNC (same=0, to create=1, to update=0, to delete=0)"));
    assert_eq!(site.dst_file("a"), None);
}

#[test]
fn missing_source_file_is_counted_as_failed() {
    let site = Site::new();
    site.publish(&[
        ("a", "file a", "2015-01-01T00:00:01Z"),
        ("b", "file b", "2015-01-01T00:00:01Z"),
    ]);
    std::fs::remove_file(site.src.path().join("b")).unwrap();
    let (mut client, sink) = site.client(SyncConfig::default());

    let summary = client.baseline(false).unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.failures[0].uri, "http://example.org/b");
    assert!(sink.contains("Status: NOT IN SYNC (same=0, created=1, updated=0, deleted=0, failed=1)"));
}

// ---------------------------------------------------------------------------
// 2. Fatal configuration errors
// ---------------------------------------------------------------------------

#[test]
fn no_mapping_is_fatal() {
    let mut client = Client::new(SyncConfig::default());
    let err = client.baseline_or_audit(true, false).unwrap_err();
    assert!(matches!(err, SyncError::Fatal(FatalError::NoMapping)));
}

#[test]
fn unreachable_source_is_fatal() {
    let site = Site::new();
    let (mut client, _) = site.client(SyncConfig::default());
    let err = client.baseline(false).unwrap_err();
    assert!(matches!(err, SyncError::Fatal(FatalError::SourceUnreadable { .. })), "got: {err}");
}

#[test]
fn empty_source_is_fatal_even_for_audit() {
    let site = Site::new();
    site.publish(&[]);
    let (mut client, _) = site.client(SyncConfig::default());
    let err = client.audit().unwrap_err();
    assert!(matches!(err, SyncError::Fatal(FatalError::NoResources { .. })));
}

#[test]
fn foreign_resource_is_fatal_without_noauth() {
    let site = Site::new();
    site.publish(&[("a", "file a", "2015-01-01T00:00:01Z")]);
    let mut rl = ResourceList::default();
    rl.add(Resource::new(format!("{ROOT}a")).with_length(6)).unwrap();
    rl.add(Resource::new("http://other.org/x").with_length(1)).unwrap();
    site.write_manifest("resourcelist.xml", &resync_manifest::to_string(&rl).unwrap());

    let (mut client, _) = site.client(SyncConfig::default());
    let err = client.baseline(false).unwrap_err();
    assert!(matches!(err, SyncError::Fatal(FatalError::OutsideAuthority { ref uri, .. }) if uri == "http://other.org/x"));
    assert_eq!(site.dst_file("a"), None, "nothing applied after a fatal error");

    let config = SyncConfig {
        noauth: true,
        ..SyncConfig::default()
    };
    let (mut client, _) = site.client(config);
    let summary = client.audit().unwrap();
    assert_eq!(summary.created, 2);
}

#[test]
fn truncated_source_list_is_fatal_and_deletes_nothing() {
    let site = Site::new();
    site.publish(&[
        ("a", "file a", "2015-01-01T00:00:01Z"),
        ("b", "file bb", "2015-01-01T00:00:02Z"),
        ("c", "file ccc", "2015-01-01T00:00:03Z"),
    ]);
    let (mut client, _) = site.client(SyncConfig::default());
    client.baseline(true).unwrap();

    // Cut the list off just after the second entry opens.
    let path = site.src.path().join("resourcelist.xml");
    let xml = std::fs::read_to_string(&path).unwrap();
    let first = xml.find("<url>").unwrap();
    let second = first + 1 + xml[first + 1..].find("<url>").unwrap();
    site.write_manifest("resourcelist.xml", &xml[..second + "<url>".len()]);

    let err = client.baseline(true).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, SyncError::Fatal(FatalError::SourceUnreadable { .. })));
    assert_eq!(site.dst_file("b").as_deref(), Some("file bb"));
    assert_eq!(site.dst_file("c").as_deref(), Some("file ccc"));
}

#[test]
fn dotfiles_named_by_the_source_converge() {
    let site = Site::new();
    std::fs::create_dir_all(site.src.path().join(".well-known")).unwrap();
    site.publish(&[
        (".htaccess", "deny", "2015-01-01T00:00:01Z"),
        (".well-known/security.txt", "contact", "2015-01-01T00:00:02Z"),
        ("a", "file a", "2015-01-01T00:00:03Z"),
    ]);
    let (mut client, _) = site.client(SyncConfig::default());

    let first = client.baseline(false).unwrap();
    assert_eq!((first.same, first.created), (0, 3));
    assert_eq!(site.dst_file(".htaccess").as_deref(), Some("deny"));

    let second = client.baseline(false).unwrap();
    assert_eq!(
        (second.same, second.created, second.updated, second.deleted),
        (3, 0, 0, 0)
    );
}

// ---------------------------------------------------------------------------
// 3. Checksums
// ---------------------------------------------------------------------------

#[test]
fn checksum_mode_is_dropped_when_source_has_none() {
    let site = Site::new();
    site.publish(&[("a", "file a", "2015-01-01T00:00:01Z")]);
    let config = SyncConfig {
        checksum: true,
        ..SyncConfig::default()
    };
    let (mut client, _) = site.client(config);
    assert!(client.checksum());
    client.audit().unwrap();
    assert!(!client.checksum());
}

#[test]
fn checksum_mismatch_with_equal_lastmod_is_updated() {
    let site = Site::new();
    site.publish_with(&[("a", "aaaa", "2015-01-01T00:00:01Z")], Some(HashAlgorithm::Md5));
    let config = SyncConfig {
        checksum: true,
        ..SyncConfig::default()
    };
    let (mut client, _) = site.client(config);
    client.baseline(false).unwrap();

    // Same length and mtime, different bytes.
    let dest = site.dst.path().join("a");
    std::fs::write(&dest, "bbbb").unwrap();
    set_mtime(&dest, ts("2015-01-01T00:00:01Z"));

    let audit = client.audit().unwrap();
    assert!(client.checksum());
    assert_eq!((audit.same, audit.updated), (0, 1));

    let (mut lastmod_only, _) = site.client(SyncConfig::default());
    let audit = lastmod_only.audit().unwrap();
    assert_eq!((audit.same, audit.updated), (1, 0));
}

// ---------------------------------------------------------------------------
// 4. Incremental
// ---------------------------------------------------------------------------

#[rstest]
#[case::listed_in_time_order(false)]
#[case::listed_in_reverse(true)]
fn later_delete_wins_regardless_of_listing_order(#[case] reverse: bool) {
    let site = Site::new();
    std::fs::write(site.dst.path().join("u"), "old").unwrap();
    let mut changes = vec![
        ("u", ChangeKind::Updated, "2015-01-01T01:00:00Z", Some("new")),
        ("u", ChangeKind::Deleted, "2015-01-01T02:00:00Z", None),
    ];
    if reverse {
        changes.reverse();
    }
    site.publish_changes(&changes);

    let (mut client, _) = site.client(SyncConfig::default());
    let summary = client.incremental(Some("2015-01-01T00:00:00Z")).unwrap();
    assert_eq!(site.dst_file("u"), None);
    assert_eq!(summary.changes_listed, 2);
    assert_eq!((summary.created, summary.updated, summary.deleted), (0, 0, 1));
}

#[test]
fn reapplying_a_change_list_reports_zero_counts() {
    let site = Site::new();
    std::fs::write(site.dst.path().join("gone"), "x").unwrap();
    site.publish_changes(&[
        ("n", ChangeKind::Created, "2015-01-01T01:00:00Z", Some("new file")),
        ("gone", ChangeKind::Deleted, "2015-01-01T01:30:00Z", None),
    ]);
    let (mut client, sink) = site.client(SyncConfig::default());

    let first = client.incremental(Some("2015-01-01T00:00:00Z")).unwrap();
    assert_eq!((first.created, first.updated, first.deleted), (1, 0, 1));
    sink.clear();

    let second = client.incremental(Some("2015-01-01T00:00:00Z")).unwrap();
    assert_eq!((second.created, second.updated, second.deleted), (0, 0, 0));
    assert!(sink.contains("Status: CHANGES APPLIED (created=0, updated=0, deleted=0)"));
}

#[test]
fn reapplying_entries_without_lastmod_reports_zero_counts() {
    let site = Site::new();
    std::fs::write(site.src.path().join("bare"), "datetime only").unwrap();
    let mut cl = ChangeList::new();
    cl.add(Resource::new(format!("{ROOT}bare")).with_change(ChangeKind::Created, ts("2015-01-01T01:00:00Z")))
        .unwrap();
    site.write_manifest("changelist.xml", &resync_manifest::to_string(&cl).unwrap());
    let (mut client, _) = site.client(SyncConfig::default());

    let first = client.incremental(Some("2015-01-01T00:00:00Z")).unwrap();
    assert_eq!(first.created, 1);
    assert_eq!(site.dst_file("bare").as_deref(), Some("datetime only"));

    let second = client.incremental(Some("2015-01-01T00:00:00Z")).unwrap();
    assert_eq!((second.created, second.updated, second.deleted), (0, 0, 0));
    assert_eq!(second.same, 1);
}

#[test]
fn empty_change_list_is_a_no_op() {
    let site = Site::new();
    site.publish_changes(&[]);
    let (mut client, sink) = site.client(SyncConfig::default());
    let summary = client.incremental(Some("2015-01-01T00:00:00Z")).unwrap();
    assert_eq!(summary.changes_listed, 0);
    assert!(sink.contains("Read source change list, 0 changes listed"));
    assert!(sink.contains("Status: CHANGES APPLIED (created=0, updated=0, deleted=0)"));
}

#[test]
fn incremental_resumes_from_recorded_baseline() {
    let site = Site::new();
    site.publish(&[("a", "file a", "2015-01-01T00:00:01Z")]);
    let (mut client, _) = site.client(SyncConfig::default());
    client.baseline(false).unwrap();

    // The resource list was published at 2015-01-01T00:00:00Z.
    site.publish_changes(&[
        ("before", ChangeKind::Created, "2014-06-01T00:00:00Z", Some("old")),
        ("after", ChangeKind::Created, "2015-01-01T05:00:00Z", Some("fresh")),
    ]);
    let summary = client.incremental(None).unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(site.dst_file("after").as_deref(), Some("fresh"));
    assert_eq!(site.dst_file("before"), None);
}

#[test]
fn second_destination_does_not_inherit_resume_point() {
    let site = Site::new();
    site.publish(&[("a", "file a", "2015-01-01T00:00:01Z")]);
    let (mut client, _) = site.client(SyncConfig::default());
    client.baseline(false).unwrap();

    let other = TempDir::new().unwrap();
    let mut second = Client::new(SyncConfig::default())
        .with_transport(Arc::new(MirrorTransport::new(ROOT, site.src.path())))
        .with_state_home(site.home.path());
    second.set_mapping(ROOT, other.path()).unwrap();

    let err = second.incremental(None).unwrap_err();
    assert!(matches!(err, SyncError::Fatal(FatalError::NoIncrementalStart { .. })));
}
