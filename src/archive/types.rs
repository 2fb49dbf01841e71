//! Archive entries, build results and build errors

use std::io::Cursor;

use serde::Serialize;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Archive write failed: {0}")]
    ArchiveWrite(String),

    #[error("Limit exceeded: {limit} (max {max})")]
    LimitExceeded { limit: &'static str, max: usize },

    #[error("Build cancelled")]
    Cancelled,

    #[error("Build timed out")]
    TimedOut,

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        BuildError::ArchiveWrite(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    Zip,
    #[serde(rename = "tar-gz")]
    TarGz,
}

impl ArchiveFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            ArchiveFormat::TarGz => "application/gzip",
        }
    }

    /// Filename suggested to the caller for the attachment
    pub fn suggested_filename(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "files.zip",
            ArchiveFormat::TarGz => "files.tar.gz",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveFormat::Zip => write!(f, "zip"),
            ArchiveFormat::TarGz => write!(f, "tar-gz"),
        }
    }
}

impl std::str::FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar-gz" | "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            other => Err(format!("Unknown archive format: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    DirectoryMarker,
}

#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub entry_path: String,
    pub kind: EntryKind,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn file(entry_path: String, bytes: Vec<u8>) -> Self {
        Self {
            entry_path,
            kind: EntryKind::File,
            bytes,
        }
    }

    pub fn directory(entry_path: String) -> Self {
        Self {
            entry_path,
            kind: EntryKind::DirectoryMarker,
            bytes: Vec::new(),
        }
    }
}

/// Step at which a node was dropped from the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipStage {
    #[serde(rename = "resolve")]
    Resolve,
    #[serde(rename = "download_link")]
    DownloadLink,
    #[serde(rename = "fetch")]
    Fetch,
    #[serde(rename = "cycle")]
    Cycle,
    /// The node's task panicked
    #[serde(rename = "internal")]
    Internal,
}

impl std::fmt::Display for SkipStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipStage::Resolve => write!(f, "resolve"),
            SkipStage::DownloadLink => write!(f, "download_link"),
            SkipStage::Fetch => write!(f, "fetch"),
            SkipStage::Cycle => write!(f, "cycle"),
            SkipStage::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedNode {
    pub path: String,
    pub stage: SkipStage,
    pub reason: String,
}

/// Finished archive plus what went into it and what was left out
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub format: ArchiveFormat,
    pub archive: Vec<u8>,
    /// Entry names in the order they were written
    pub entries: Vec<String>,
    pub skipped: Vec<SkippedNode>,
}

impl BuildReport {
    pub fn into_reader(self) -> Cursor<Vec<u8>> {
        Cursor::new(self.archive)
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_round_trip_through_parse() {
        assert_eq!("ZIP".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::Zip);
        assert_eq!("tgz".parse::<ArchiveFormat>().unwrap(), ArchiveFormat::TarGz);
        assert_eq!(
            ArchiveFormat::TarGz.to_string().parse::<ArchiveFormat>().unwrap(),
            ArchiveFormat::TarGz
        );
        assert!("rar".parse::<ArchiveFormat>().is_err());
    }

    #[test]
    fn formats_describe_their_download() {
        assert_eq!(ArchiveFormat::default(), ArchiveFormat::Zip);
        assert_eq!(ArchiveFormat::Zip.suggested_filename(), "files.zip");
        assert_eq!(ArchiveFormat::Zip.mime_type(), "application/zip");
        assert_eq!(ArchiveFormat::TarGz.suggested_filename(), "files.tar.gz");
        assert_eq!(ArchiveFormat::TarGz.mime_type(), "application/gzip");
    }
}
