//! Reading and writing ResourceSync manifests (sitemap XML with `rs:md`
//! metadata).
//!
//! [`reader::parse`] turns one physical document into a [`Manifest`];
//! [`reader::read_with`] follows a sitemap index and merges its components.
//! [`writer`] emits single documents or paginated sets.

pub mod datetime;
pub mod document;
pub mod error;
pub mod reader;
pub mod writer;

pub use document::{Header, Manifest, ManifestSource, SitemapIndex, UrlSet};
pub use error::{BoxError, ManifestError};
pub use reader::{parse, read_with};
pub use writer::{to_string, write, write_index, write_paginated};
