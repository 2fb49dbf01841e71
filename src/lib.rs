//! Browse a public cloud-disk share and bundle selected files and folders into one archive.
//!
//! [`disk::DiskClient`] talks to the provider's public resources API and
//! [`archive::ArchiveBuilder`] turns a selection of paths into a zip or tar.gz archive
//! that mirrors the shared folder structure.

pub mod archive;
pub mod config;
pub mod disk;

pub use archive::{ArchiveBuilder, ArchiveFormat, BuildError, BuildReport, SkippedNode};
pub use config::BuildConfig;
pub use disk::{DiskClient, FileFilter, ListingCache, ResourceItem, ResourceKind, ResourceNode};
