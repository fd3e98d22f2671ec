//! resync core library: domain types, URI/path mapping, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: resources, resource lists, change lists, capabilities
//! - [`mapper`]: [`Mapper`] and [`Mapping`]
//! - [`config`]: [`SyncConfig`] load / defaults
//! - [`error`]: [`MapperError`], [`ModelError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod mapper;
pub mod types;

pub use config::SyncConfig;
pub use error::{ConfigError, MapperError, ModelError};
pub use mapper::{Mapper, Mapping};
pub use types::{
    Capability, ChangeKind, ChangeList, Checksum, HashAlgorithm, Resource, ResourceList,
    DEFAULT_MAX_ENTRIES_PER_PAGE,
};
