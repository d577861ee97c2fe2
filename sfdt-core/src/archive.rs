//! Stored (uncompressed) ZIP archives built entirely in memory.
//!
//! The metadata deploy endpoint accepts stored entries and requires explicit directory entries,
//! so this builder only ever writes compression method 0. Output is deterministic: the same
//! entry list always produces the same bytes (timestamps are zero).
//!
//! Layout, in order:
//! - per entry: 30-byte local file header, name, data
//! - per entry: 46-byte central directory record, name
//! - 22-byte end of central directory record

use tracing::debug;

use crate::error::BridgeError;

const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4B50;
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4B50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605_4B50;

pub const LOCAL_HEADER_LEN: usize = 30;
pub const CENTRAL_HEADER_LEN: usize = 46;
pub const END_OF_CENTRAL_DIRECTORY_LEN: usize = 22;

/// Version 2.0: plain stored entries.
const VERSION: u16 = 20;
const METHOD_STORED: u16 = 0;
const DIRECTORY_ATTRIBUTE: u32 = 0x10;

const CRC32_POLYNOMIAL: u32 = 0xEDB8_8320;

/// Standard reflected CRC-32 (as used by ZIP, PNG, gzip).
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLYNOMIAL
            } else {
                crc >> 1
            };
        }
    }
    crc ^ 0xFFFF_FFFF
}

/// One archive member. A name ending in `/` is a directory and its bytes are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn directory(name: impl Into<String>) -> Self {
        let mut name = name.into();
        if !name.ends_with('/') {
            name.push('/');
        }
        Self {
            name,
            bytes: Vec::new(),
        }
    }

    pub fn file(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    fn data(&self) -> &[u8] {
        if self.is_directory() {
            &[]
        } else {
            self.bytes.as_slice()
        }
    }
}

/// Accumulates entries, then writes bodies and the central directory in two passes.
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    entries: Vec<ArchiveEntry>,
}

/// Bookkeeping for one written entry, consumed by the central-directory pass.
struct WrittenEntry<'a> {
    name: &'a [u8],
    name_len: u16,
    crc: u32,
    size: u32,
    offset: u32,
    is_directory: bool,
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn too_large(name: &str) -> BridgeError {
    BridgeError::Archive {
        name: name.to_string(),
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, entry: ArchiveEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn add_directory(self, name: impl Into<String>) -> Self {
        self.add(ArchiveEntry::directory(name))
    }

    pub fn add_file(self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.add(ArchiveEntry::file(name, bytes))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialises the archive. Fails only when an entry or the archive exceeds the 32-bit
    /// sizes and 16-bit counts of the classic format.
    pub fn build(&self) -> Result<Vec<u8>, BridgeError> {
        let mut out = Vec::new();
        let mut written = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let data = entry.data();
            let name = entry.name.as_bytes();
            let name_len = u16::try_from(name.len()).map_err(|_| too_large(&entry.name))?;
            let size = u32::try_from(data.len()).map_err(|_| too_large(&entry.name))?;
            let offset = u32::try_from(out.len()).map_err(|_| too_large(&entry.name))?;
            let crc = if entry.is_directory() { 0 } else { crc32(data) };

            put_u32(&mut out, LOCAL_HEADER_SIGNATURE);
            put_u16(&mut out, VERSION);
            put_u16(&mut out, 0); // flags
            put_u16(&mut out, METHOD_STORED);
            put_u16(&mut out, 0); // mod time
            put_u16(&mut out, 0); // mod date
            put_u32(&mut out, crc);
            put_u32(&mut out, size); // compressed
            put_u32(&mut out, size); // uncompressed
            put_u16(&mut out, name_len);
            put_u16(&mut out, 0); // extra length
            out.extend_from_slice(name);
            out.extend_from_slice(data);

            written.push(WrittenEntry {
                name,
                name_len,
                crc,
                size,
                offset,
                is_directory: entry.is_directory(),
            });
        }

        let central_offset = u32::try_from(out.len()).map_err(|_| too_large("central directory"))?;
        for entry in &written {
            put_u32(&mut out, CENTRAL_HEADER_SIGNATURE);
            put_u16(&mut out, VERSION); // made by
            put_u16(&mut out, VERSION); // needed
            put_u16(&mut out, 0); // flags
            put_u16(&mut out, METHOD_STORED);
            put_u16(&mut out, 0); // mod time
            put_u16(&mut out, 0); // mod date
            put_u32(&mut out, entry.crc);
            put_u32(&mut out, entry.size);
            put_u32(&mut out, entry.size);
            put_u16(&mut out, entry.name_len);
            put_u16(&mut out, 0); // extra length
            put_u16(&mut out, 0); // comment length
            put_u16(&mut out, 0); // disk number
            put_u16(&mut out, 0); // internal attributes
            put_u32(
                &mut out,
                if entry.is_directory {
                    DIRECTORY_ATTRIBUTE
                } else {
                    0
                },
            );
            put_u32(&mut out, entry.offset);
            out.extend_from_slice(entry.name);
        }

        let central_size = u32::try_from(out.len())
            .map_err(|_| too_large("central directory"))?
            - central_offset;
        let count = u16::try_from(written.len()).map_err(|_| too_large("entry count"))?;

        put_u32(&mut out, END_OF_CENTRAL_DIRECTORY_SIGNATURE);
        put_u16(&mut out, 0); // this disk
        put_u16(&mut out, 0); // central directory disk
        put_u16(&mut out, count); // entries on this disk
        put_u16(&mut out, count); // total entries
        put_u32(&mut out, central_size);
        put_u32(&mut out, central_offset);
        put_u16(&mut out, 0); // comment length

        debug!(
            entries = count,
            bytes = out.len(),
            central_offset,
            central_size,
            "Built stored archive"
        );
        Ok(out)
    }
}

/// Builds an archive from an ordered entry list.
pub fn build(entries: &[ArchiveEntry]) -> Result<Vec<u8>, BridgeError> {
    entries
        .iter()
        .cloned()
        .fold(ArchiveBuilder::new(), ArchiveBuilder::add)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_of_empty_input_is_zero() {
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn crc32_matches_reference_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(
            crc32(b"The quick brown fox jumps over the lazy dog"),
            0x414F_A339
        );
    }

    #[test]
    fn directory_entries_gain_a_trailing_slash() {
        assert_eq!(ArchiveEntry::directory("objectTranslations").name, "objectTranslations/");
    }

    #[test]
    fn empty_archive_is_a_bare_end_record() {
        let bytes = ArchiveBuilder::new().build().unwrap();
        assert_eq!(bytes.len(), END_OF_CENTRAL_DIRECTORY_LEN);
        assert_eq!(&bytes[0..4], &[0x50, 0x4B, 0x05, 0x06]);
    }
}
