//! # resync-sync
//!
//! Synchronize a local tree with a source described by ResourceSync
//! manifests.
//!
//! [`Client`] is the entry point: set a mapping, then run
//! [`Client::baseline_or_audit`] or [`Client::incremental`]. The pieces it
//! composes ([`builder`], [`diff`], [`executor`], [`transport`]) are usable
//! on their own.

pub mod authority;
pub mod builder;
pub mod client;
pub mod diff;
pub mod error;
pub mod events;
pub mod executor;
pub mod publisher;
pub mod status_store;
pub mod summary;
pub mod transport;

pub use client::Client;
pub use diff::{diff, Delta};
pub use error::{FatalError, SyncError, TransferError, TransferFailure};
pub use events::{EventSink, MemorySink, SyncEvent, TracingSink};
pub use summary::{SyncMode, SyncSummary};
pub use transport::{DefaultTransport, MirrorTransport, Transport};
