//! Archive writer - single owner of the output archive
//!
//! Producers never touch the archive directly; they send finished entries over a
//! channel and the writer thread appends them one at a time.

use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, error};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::types::{ArchiveEntry, ArchiveFormat, BuildError, BuildResult, EntryKind};
use super::zip_stream::ZipStream;

/// What the writer hands back once every producer is done
pub(crate) struct WrittenArchive {
    pub archive: Vec<u8>,
    pub entries: Vec<String>,
}

/// Both sinks append every entry as given, repeated names included
enum ArchiveSink {
    Zip(ZipStream),
    TarGz {
        builder: tar::Builder<GzEncoder<Vec<u8>>>,
        mtime: u64,
    },
}

impl ArchiveSink {
    fn new(format: ArchiveFormat) -> Self {
        let mtime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        match format {
            ArchiveFormat::Zip => ArchiveSink::Zip(ZipStream::new(mtime)),
            ArchiveFormat::TarGz => ArchiveSink::TarGz {
                builder: tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default())),
                mtime,
            },
        }
    }

    fn write(&mut self, entry: &ArchiveEntry) -> BuildResult<()> {
        match self {
            ArchiveSink::Zip(zip) => match entry.kind {
                EntryKind::DirectoryMarker => zip.add_directory(&entry.entry_path),
                EntryKind::File => zip.add_file(&entry.entry_path, &entry.bytes),
            },
            ArchiveSink::TarGz { builder, mtime } => {
                let mut header = tar::Header::new_gnu();
                header.set_mtime(*mtime);
                match entry.kind {
                    EntryKind::DirectoryMarker => {
                        header.set_entry_type(tar::EntryType::Directory);
                        header.set_mode(0o755);
                        header.set_size(0);
                        builder.append_data(&mut header, &entry.entry_path, std::io::empty())?;
                    }
                    EntryKind::File => {
                        header.set_entry_type(tar::EntryType::Regular);
                        header.set_mode(0o644);
                        header.set_size(entry.bytes.len() as u64);
                        builder.append_data(
                            &mut header,
                            &entry.entry_path,
                            entry.bytes.as_slice(),
                        )?;
                    }
                }
                Ok(())
            }
        }
    }

    fn finish(self) -> BuildResult<Vec<u8>> {
        match self {
            ArchiveSink::Zip(zip) => zip.finish(),
            ArchiveSink::TarGz { builder, .. } => Ok(builder.into_inner()?.finish()?),
        }
    }
}

/// Spawn the writer on a blocking thread. It drains `receiver` until every sender is
/// dropped, then finalizes the archive.
pub(crate) fn spawn_writer(
    format: ArchiveFormat,
    mut receiver: mpsc::Receiver<ArchiveEntry>,
) -> JoinHandle<BuildResult<WrittenArchive>> {
    tokio::task::spawn_blocking(move || {
        let mut sink = ArchiveSink::new(format);
        let mut entries = Vec::new();

        while let Some(entry) = receiver.blocking_recv() {
            if let Err(e) = sink.write(&entry) {
                error!("archive_write_failed: entry={} error={}", entry.entry_path, e);
                return Err(e);
            }
            debug!(
                "archive_entry: {} bytes={}",
                entry.entry_path,
                entry.bytes.len()
            );
            entries.push(entry.entry_path);
        }

        let archive = sink.finish().map_err(|e| {
            error!("archive_finish_failed: error={}", e);
            e
        })?;
        Ok(WrittenArchive { archive, entries })
    })
}

/// Await the writer, folding a panicked or aborted task into a write error
pub(crate) async fn join_writer(
    handle: JoinHandle<BuildResult<WrittenArchive>>,
) -> BuildResult<WrittenArchive> {
    handle
        .await
        .map_err(|e| BuildError::ArchiveWrite(format!("writer task failed: {}", e)))?
}
