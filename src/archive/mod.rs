//! Archive module - bundles selected share resources into a single archive
//!
//! Provides:
//! - Explicit work-queue traversal of selected files and folders
//! - Bounded concurrency for outbound requests
//! - A single writer task that owns the archive; repeated entry names are kept
//! - Node-level failures recorded as a skip list instead of aborting the build

mod builder;
mod naming;
mod types;
mod writer;
mod zip_stream;

pub use builder::ArchiveBuilder;
pub use types::{
    ArchiveEntry, ArchiveFormat, BuildError, BuildReport, BuildResult, EntryKind, SkipStage,
    SkippedNode,
};
