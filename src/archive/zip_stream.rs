//! In-memory zip writer that appends entries as they come.
//!
//! Entries are never looked up by name, so a repeated name is stored again as its own
//! entry. File data is deflated up front, which lets every local header carry the real
//! CRC and sizes (no data descriptors). Classic zip only: names up to 64 KiB, sizes and
//! offsets below 4 GiB, at most 65535 entries.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

use super::types::{BuildError, BuildResult};

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x0605_4b50;

const VERSION_NEEDED: u16 = 20;
// Unix host, zip format version 2.0
const VERSION_MADE_BY: u16 = (3 << 8) | 20;
const FLAG_UTF8: u16 = 1 << 11;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

const FILE_ATTRIBUTES: u32 = 0o100644 << 16;
// Unix mode plus the MS-DOS directory bit
const DIRECTORY_ATTRIBUTES: u32 = (0o040755 << 16) | 0x10;

pub(crate) struct ZipStream {
    out: Vec<u8>,
    central: Vec<u8>,
    count: usize,
    dos_time: u16,
    dos_date: u16,
}

struct EntryHeader<'a> {
    name: &'a str,
    method: u16,
    crc: u32,
    size: usize,
    attributes: u32,
}

impl ZipStream {
    /// `mtime` is stamped on every entry (seconds since the Unix epoch)
    pub fn new(mtime: u64) -> Self {
        let (dos_time, dos_date) = dos_datetime(mtime);
        Self {
            out: Vec::new(),
            central: Vec::new(),
            count: 0,
            dos_time,
            dos_date,
        }
    }

    pub fn add_directory(&mut self, name: &str) -> BuildResult<()> {
        let header = EntryHeader {
            name,
            method: METHOD_STORED,
            crc: 0,
            size: 0,
            attributes: DIRECTORY_ATTRIBUTES,
        };
        self.append(header, &[])
    }

    pub fn add_file(&mut self, name: &str, bytes: &[u8]) -> BuildResult<()> {
        let mut crc = Crc::new();
        crc.update(bytes);

        let mut encoder =
            DeflateEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
        encoder.write_all(bytes)?;
        let compressed = encoder.finish()?;

        let header = EntryHeader {
            name,
            method: METHOD_DEFLATED,
            crc: crc.sum(),
            size: bytes.len(),
            attributes: FILE_ATTRIBUTES,
        };
        self.append(header, &compressed)
    }

    fn append(&mut self, header: EntryHeader<'_>, data: &[u8]) -> BuildResult<()> {
        let name = header.name.as_bytes();
        let name_len = u16::try_from(name.len())
            .map_err(|_| limit(format!("entry name is {} bytes", name.len())))?;
        if self.count >= u16::MAX as usize {
            return Err(limit(format!("more than {} entries", u16::MAX)));
        }
        let compressed_size = to_u32(data.len(), header.name)?;
        let size = to_u32(header.size, header.name)?;
        let offset = to_u32(self.out.len(), header.name)?;
        let flags = if header.name.is_ascii() { 0 } else { FLAG_UTF8 };

        let out = &mut self.out;
        put_u32(out, LOCAL_HEADER_SIGNATURE);
        put_u16(out, VERSION_NEEDED);
        put_u16(out, flags);
        put_u16(out, header.method);
        put_u16(out, self.dos_time);
        put_u16(out, self.dos_date);
        put_u32(out, header.crc);
        put_u32(out, compressed_size);
        put_u32(out, size);
        put_u16(out, name_len);
        put_u16(out, 0);
        out.extend_from_slice(name);
        out.extend_from_slice(data);

        let central = &mut self.central;
        put_u32(central, CENTRAL_HEADER_SIGNATURE);
        put_u16(central, VERSION_MADE_BY);
        put_u16(central, VERSION_NEEDED);
        put_u16(central, flags);
        put_u16(central, header.method);
        put_u16(central, self.dos_time);
        put_u16(central, self.dos_date);
        put_u32(central, header.crc);
        put_u32(central, compressed_size);
        put_u32(central, size);
        put_u16(central, name_len);
        put_u16(central, 0); // extra field
        put_u16(central, 0); // comment
        put_u16(central, 0); // disk number
        put_u16(central, 0); // internal attributes
        put_u32(central, header.attributes);
        put_u32(central, offset);
        central.extend_from_slice(name);

        self.count += 1;
        Ok(())
    }

    /// Append the central directory and return the finished archive
    pub fn finish(mut self) -> BuildResult<Vec<u8>> {
        let directory_offset = to_u32(self.out.len(), "central directory")?;
        let directory_size = to_u32(self.central.len(), "central directory")?;
        let count = self.count as u16;

        self.out.extend_from_slice(&self.central);
        let out = &mut self.out;
        put_u32(out, END_OF_CENTRAL_DIR_SIGNATURE);
        put_u16(out, 0);
        put_u16(out, 0);
        put_u16(out, count);
        put_u16(out, count);
        put_u32(out, directory_size);
        put_u32(out, directory_offset);
        put_u16(out, 0);
        Ok(self.out)
    }
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn to_u32(value: usize, what: &str) -> BuildResult<u32> {
    u32::try_from(value).map_err(|_| limit(format!("{} exceeds 4 GiB", what)))
}

fn limit(detail: String) -> BuildError {
    BuildError::ArchiveWrite(format!("zip format limit: {}", detail))
}

/// MS-DOS (time, date) of a Unix timestamp in UTC. Dates outside 1980..=2107 clamp
/// to the DOS epoch.
fn dos_datetime(unix_secs: u64) -> (u16, u16) {
    const DOS_EPOCH: (u16, u16) = (0, (1 << 5) | 1);

    let days = (unix_secs / 86_400) as i64;
    let secs = unix_secs % 86_400;

    // Days since 1970-01-01 to a proleptic Gregorian civil date
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };

    if !(1980..=2107).contains(&year) {
        return DOS_EPOCH;
    }
    let time = ((secs / 3600) << 11) | (((secs % 3600) / 60) << 5) | ((secs % 60) / 2);
    let date = ((year - 1980) << 9) | (month << 5) | day;
    (time as u16, date as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    fn stream_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut reader = Cursor::new(bytes);
        let mut entries = Vec::new();
        while let Some(mut file) = zip::read::read_zipfile_from_stream(&mut reader).unwrap() {
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            entries.push((file.name().to_string(), content));
        }
        entries
    }

    #[test]
    fn repeated_names_are_stored_twice() {
        let mut stream = ZipStream::new(0);
        stream.add_directory("docs/").unwrap();
        stream.add_file("docs/a.txt", b"one").unwrap();
        stream.add_directory("docs/").unwrap();
        stream.add_file("docs/a.txt", b"one").unwrap();
        let bytes = stream.finish().unwrap();

        assert_eq!(
            stream_entries(&bytes),
            vec![
                ("docs/".to_string(), Vec::new()),
                ("docs/a.txt".to_string(), b"one".to_vec()),
                ("docs/".to_string(), Vec::new()),
                ("docs/a.txt".to_string(), b"one".to_vec()),
            ]
        );
    }

    #[test]
    fn central_directory_points_at_every_entry() {
        let body: Vec<u8> = (0..50_000u32).map(|i| (i % 7) as u8).collect();
        let mut stream = ZipStream::new(1_704_067_200);
        stream.add_directory("photos/").unwrap();
        stream.add_file("photos/big.bin", &body).unwrap();
        stream.add_file("notes/ünïcode.txt", b"hi").unwrap();
        let bytes = stream.finish().unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        assert!(archive.by_name("photos/").unwrap().is_dir());

        let mut content = Vec::new();
        archive
            .by_name("photos/big.bin")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, body);

        let mut text = String::new();
        archive
            .by_name("notes/ünïcode.txt")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "hi");
    }

    #[test]
    fn oversized_name_is_a_write_error() {
        let mut stream = ZipStream::new(0);
        let name = "x".repeat(70_000);
        let err = stream.add_file(&name, b"data").unwrap_err();
        assert!(matches!(err, BuildError::ArchiveWrite(_)));
    }

    #[test]
    fn dos_datetime_converts_utc_timestamps() {
        // 2024-01-01T00:00:00Z
        assert_eq!(dos_datetime(1_704_067_200), (0, (44 << 9) | (1 << 5) | 1));
        // 2024-02-29T13:45:30Z
        assert_eq!(
            dos_datetime(1_709_214_330),
            ((13 << 11) | (45 << 5) | 15, (44 << 9) | (2 << 5) | 29)
        );
        assert_eq!(dos_datetime(0), (0, (1 << 5) | 1));
    }
}
