//! Package archive access via the `zip` crate
//!
//! `ZipArchive` indexes members by name, so a name that appears twice in the
//! central directory only resolves to its last record. Member listing walks
//! the central directory records instead, which keeps every occurrence.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek as _, SeekFrom};
use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::eyre;
use zip::ZipArchive;
use zip::read::{ZipFile, read_zipfile_from_stream};
use zip::result::{ZipError, ZipResult};

use crate::error::LoadError;

/// Central directory file header signature
const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;

/// Fixed part of a central directory file header, signature included
const CENTRAL_HEADER_LEN: usize = 46;

/// Extra field holding 64-bit sizes and offsets
const ZIP64_EXTRA_ID: u16 = 0x0001;

/// A single member of a package as listed in its central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Full path of the member inside the package
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
}

/// One central directory record
#[derive(Debug, Clone)]
struct Record {
    member: Member,
    /// Absolute offset of the local file header
    header_start: u64,
}

/// An open package archive.
///
/// The underlying file handle is closed when the archive is dropped.
pub struct PackageArchive {
    path: PathBuf,
    zip: RefCell<ZipArchive<BufReader<File>>>,
    records: Vec<Record>,
}

impl std::fmt::Debug for PackageArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageArchive")
            .field("path", &self.path)
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl PackageArchive {
    /// Open the package at `path` and read its central directory
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or is not a valid zip archive
    pub fn open(path: impl Into<PathBuf>) -> std::result::Result<Self, LoadError> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| LoadError::io(&path, e))?;
        let archive_error = |source| LoadError::Archive {
            path: path.clone(),
            source,
        };

        let mut zip = ZipArchive::new(BufReader::new(file)).map_err(archive_error)?;
        let records = read_central_directory(&mut zip, &path).map_err(archive_error)?;

        Ok(Self {
            path,
            zip: RefCell::new(zip),
            records,
        })
    }

    /// Path the archive was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of central directory records, repeated names included
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every member in central-directory order, repeated names included
    #[must_use]
    pub fn members(&self) -> Vec<Member> {
        self.records.iter().map(|r| r.member.clone()).collect()
    }

    /// Extract the first member called `name` below `dir`, keeping its
    /// relative path.
    ///
    /// Returns the path of the written file.
    ///
    /// # Errors
    /// Returns an error if the member is missing, its name escapes `dir`,
    /// or writing fails
    pub fn extract(&self, name: &str, dir: &Path) -> Result<PathBuf> {
        let record = self
            .records
            .iter()
            .find(|r| r.member.name == name)
            .ok_or_else(|| eyre!("Entry '{name}' not found in {}", self.path.display()))?;

        let mut zip = self.zip.borrow_mut();
        let index = zip
            .index_for_name(name)
            .ok_or_else(|| eyre!("Entry '{name}' not found in {}", self.path.display()))?;

        if zip.by_index_raw(index)?.header_start() == record.header_start {
            let mut file = zip.by_index(index)?;
            return write_member(&mut file, name, dir);
        }

        // The name index points at a later duplicate; read the first one directly
        let mut reader = BufReader::new(File::open(&self.path)?);
        reader.seek(SeekFrom::Start(record.header_start))?;
        let mut file = read_zipfile_from_stream(&mut reader)?
            .ok_or_else(|| eyre!("No local header for '{name}' in {}", self.path.display()))?;
        write_member(&mut file, name, dir)
    }
}

fn write_member<R: Read>(file: &mut ZipFile<'_, R>, name: &str, dir: &Path) -> Result<PathBuf> {
    let relative = file
        .enclosed_name()
        .ok_or_else(|| eyre!("Entry '{name}' would be extracted outside {}", dir.display()))?;
    let target = dir.join(relative);

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = File::create(&target)?;
    std::io::copy(file, &mut out)?;

    Ok(target)
}

/// Read every central directory record of the archive behind `zip`.
///
/// Names are decoded the way `zip` decodes them, so they match `by_name`.
fn read_central_directory(
    zip: &mut ZipArchive<BufReader<File>>,
    path: &Path,
) -> ZipResult<Vec<Record>> {
    let mut names: HashMap<Vec<u8>, String> = HashMap::with_capacity(zip.len());
    for index in 0..zip.len() {
        // Raw access skips decompressor setup, only the header is needed
        let file = zip.by_index_raw(index)?;
        names.insert(file.name_raw().to_vec(), file.name().to_string());
    }

    let mut reader = BufReader::new(File::open(path)?);
    reader.seek(SeekFrom::Start(zip.central_directory_start()))?;

    let mut records = Vec::with_capacity(zip.len());
    loop {
        let mut header = [0u8; CENTRAL_HEADER_LEN];
        reader.read_exact(&mut header[..4])?;
        // End of central directory (or its zip64 variant) follows the last record
        if u32_at(&header, 0) != CENTRAL_HEADER_SIGNATURE {
            break;
        }
        reader.read_exact(&mut header[4..])?;

        let mut raw_name = vec![0u8; usize::from(u16_at(&header, 28))];
        reader.read_exact(&mut raw_name)?;
        let mut extra = vec![0u8; usize::from(u16_at(&header, 30))];
        reader.read_exact(&mut extra)?;
        reader.seek_relative(i64::from(u16_at(&header, 32)))?;

        let mut size = u64::from(u32_at(&header, 24));
        let mut offset = u64::from(u32_at(&header, 42));
        let compressed_overflow = u32_at(&header, 20) == u32::MAX;
        apply_zip64(&extra, &mut size, compressed_overflow, &mut offset)?;

        let name = names
            .get(&raw_name)
            .cloned()
            .unwrap_or_else(|| String::from_utf8_lossy(&raw_name).into_owned());
        let header_start = offset
            .checked_add(zip.offset())
            .ok_or(ZipError::InvalidArchive("local header offset overflows".into()))?;

        records.push(Record {
            member: Member { name, size },
            header_start,
        });
    }

    Ok(records)
}

/// Replace saturated 32-bit fields with their values from the zip64 extra field
fn apply_zip64(
    extra: &[u8],
    size: &mut u64,
    compressed_overflow: bool,
    offset: &mut u64,
) -> ZipResult<()> {
    let saturated = u64::from(u32::MAX);
    if *size != saturated && *offset != saturated && !compressed_overflow {
        return Ok(());
    }

    let mut rest = extra;
    while rest.len() >= 4 {
        let id = u16_at(rest, 0);
        let len = usize::from(u16_at(rest, 2));
        let data = rest
            .get(4..4 + len)
            .ok_or(ZipError::InvalidArchive("truncated extra field".into()))?;
        rest = &rest[4 + len..];

        if id != ZIP64_EXTRA_ID {
            continue;
        }

        let mut cursor = data;
        let mut next = || -> ZipResult<u64> {
            let (value, tail) = cursor
                .split_first_chunk::<8>()
                .ok_or(ZipError::InvalidArchive("truncated zip64 extra field".into()))?;
            cursor = tail;
            Ok(u64::from_le_bytes(*value))
        };

        if *size == saturated {
            *size = next()?;
        }
        if compressed_overflow {
            next()?;
        }
        if *offset == saturated {
            *offset = next()?;
        }
        return Ok(());
    }

    Ok(())
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Write a small package for tests
#[cfg(test)]
pub(crate) fn write_test_package(path: &Path, entries: &[(&str, &[u8])]) {
    use std::io::Write as _;

    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

/// Write a package of stored entries byte by byte.
///
/// Unlike `ZipWriter`, this lets a name appear more than once.
#[cfg(test)]
pub(crate) fn write_raw_package(path: &Path, entries: &[(&str, &[u8])]) {
    fn le16(buf: &mut Vec<u8>, value: u16) {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    fn le32(buf: &mut Vec<u8>, value: u32) {
        buf.extend_from_slice(&value.to_le_bytes());
    }

    let mut out = Vec::new();
    let mut central = Vec::new();

    for (name, data) in entries {
        let offset = u32::try_from(out.len()).unwrap();
        let crc = crc32fast::hash(data);
        let size = u32::try_from(data.len()).unwrap();
        let name_len = u16::try_from(name.len()).unwrap();

        le32(&mut out, 0x0403_4b50);
        le16(&mut out, 20); // version needed
        le16(&mut out, 0); // flags
        le16(&mut out, 0); // stored
        le16(&mut out, 0); // time
        le16(&mut out, 0x21); // 1980-01-01
        le32(&mut out, crc);
        le32(&mut out, size);
        le32(&mut out, size);
        le16(&mut out, name_len);
        le16(&mut out, 0); // extra length
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        le32(&mut central, CENTRAL_HEADER_SIGNATURE);
        le16(&mut central, 20); // version made by
        le16(&mut central, 20); // version needed
        le16(&mut central, 0);
        le16(&mut central, 0);
        le16(&mut central, 0);
        le16(&mut central, 0x21);
        le32(&mut central, crc);
        le32(&mut central, size);
        le32(&mut central, size);
        le16(&mut central, name_len);
        le16(&mut central, 0); // extra length
        le16(&mut central, 0); // comment length
        le16(&mut central, 0); // disk
        le16(&mut central, 0); // internal attributes
        le32(&mut central, 0); // external attributes
        le32(&mut central, offset);
        central.extend_from_slice(name.as_bytes());
    }

    let count = u16::try_from(entries.len()).unwrap();
    let central_offset = u32::try_from(out.len()).unwrap();
    let central_size = u32::try_from(central.len()).unwrap();
    out.extend_from_slice(&central);

    le32(&mut out, 0x0605_4b50);
    le16(&mut out, 0);
    le16(&mut out, 0);
    le16(&mut out, count);
    le16(&mut out, count);
    le32(&mut out, central_size);
    le32(&mut out, central_offset);
    le16(&mut out, 0); // comment length

    std::fs::write(path, out).unwrap();
}
