//! Disk module - public share operations against the provider API
//!
//! This module is organized into submodules:
//! - `types`: Resolved nodes, listing rows, wire payloads and errors
//! - `client`: Metadata resolution, download links and byte streams
//! - `filter`: File-type filters for listings
//! - `listing`: Cached folder browsing

mod client;
mod filter;
mod listing;
mod types;

pub use client::DiskClient;
pub use filter::FileFilter;
pub use listing::{list_folder, ListingCache};
pub use types::{DiskResult, ResourceItem, ResourceKind, ResourceNode, UpstreamError};
