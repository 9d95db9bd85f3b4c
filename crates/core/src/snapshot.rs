//! Snapshot: the comparable view of a package's entry table

use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::archive::{Member, PackageArchive};
use crate::error::LoadError;

/// Properties recorded for every package entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryProperties {
    /// Uncompressed size in bytes
    #[serde(alias = "Size")]
    pub size: u64,
}

/// Where a snapshot came from
#[derive(Debug)]
pub enum Origin {
    /// Built from an open package; entries can be extracted for deep comparison
    Live(PackageArchive),
    /// Decoded from a description file or built in memory
    Detached,
}

/// Entry table plus package metadata.
///
/// Entries keep the order in which they were first seen, which is also the
/// order they are written in when the snapshot is saved.
#[derive(Debug)]
pub struct Snapshot {
    entries: IndexMap<String, EntryProperties>,
    package_size: u64,
    package_path: PathBuf,
    comment: Option<String>,
    origin: Origin,
}

/// On-disk shape of a snapshot (`.apkdesc`)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionOut<'a> {
    comment: Option<&'a str>,
    package_size: u64,
    entries: &'a IndexMap<String, EntryProperties>,
}

/// Accepts both the emitted camelCase keys and the PascalCase keys of older files
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptionIn {
    #[serde(default, alias = "Comment")]
    comment: Option<String>,
    #[serde(default, alias = "PackageSize")]
    package_size: u64,
    #[serde(default, alias = "Entries")]
    entries: IndexMap<String, EntryProperties>,
}

impl Snapshot {
    /// Create a detached snapshot from `(path, size)` pairs.
    ///
    /// Repeated paths keep their first size.
    #[must_use]
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let members = entries.into_iter().map(|(name, size)| Member {
            name: name.into(),
            size,
        });

        Self {
            entries: collect_entries(members),
            package_size: 0,
            package_path: PathBuf::new(),
            comment: None,
            origin: Origin::Detached,
        }
    }

    /// Build a live snapshot by enumerating `archive`.
    ///
    /// The package size is the byte length of the archive file.
    ///
    /// Every central directory record is visited, so a repeated name keeps
    /// its first size and is reported as a duplicate.
    ///
    /// # Errors
    /// Returns an error if the file metadata cannot be read
    pub fn from_archive(archive: PackageArchive) -> Result<Self, LoadError> {
        let path = archive.path().to_path_buf();
        debug!("Loading apk '{}'", path.display());

        let package_size = std::fs::metadata(&path)
            .map_err(|e| LoadError::io(&path, e))?
            .len();
        let entries = collect_entries(archive.members());

        Ok(Self {
            entries,
            package_size,
            package_path: path,
            comment: None,
            origin: Origin::Live(archive),
        })
    }

    /// Set the total package size in bytes
    #[must_use]
    pub fn with_package_size(mut self, package_size: u64) -> Self {
        self.package_size = package_size;
        self
    }

    /// Set the informational origin path
    #[must_use]
    pub fn with_package_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.package_path = path.into();
        self
    }

    /// Set the annotation written with the snapshot
    #[must_use]
    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn set_comment(&mut self, comment: Option<String>) {
        self.comment = comment;
    }

    #[must_use]
    pub fn entries(&self) -> &IndexMap<String, EntryProperties> {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&EntryProperties> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn package_size(&self) -> u64 {
        self.package_size
    }

    #[must_use]
    pub fn package_path(&self) -> &Path {
        &self.package_path
    }

    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The open archive, if this snapshot was built from a real package
    #[must_use]
    pub fn archive(&self) -> Option<&PackageArchive> {
        match &self.origin {
            Origin::Live(archive) => Some(archive),
            Origin::Detached => None,
        }
    }

    /// Whether entries can be extracted from this snapshot
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.origin, Origin::Live(_))
    }

    /// Close the underlying archive, if any. Entry data is kept.
    pub fn release_archive(&mut self) {
        self.origin = Origin::Detached;
    }

    /// Encode as indented JSON
    ///
    /// # Errors
    /// Returns an error if serialization fails
    pub fn to_description_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.description())
    }

    /// Decode a snapshot from description text
    ///
    /// # Errors
    /// Returns an error if the text is not a valid description
    pub fn from_description_str(text: &str) -> serde_json::Result<Self> {
        let desc: DescriptionIn = serde_json::from_str(text)?;
        Ok(Self::from_description(desc, PathBuf::new()))
    }

    /// Write the snapshot to `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        let file = File::create(path).map_err(|e| LoadError::io(path, e))?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, &self.description()).map_err(|source| {
            LoadError::Description {
                path: path.to_path_buf(),
                source,
            }
        })?;
        writeln!(writer)
            .and_then(|()| writer.flush())
            .map_err(|e| LoadError::io(path, e))?;

        Ok(())
    }

    /// Read a snapshot previously written with [`Snapshot::save`]
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or decoded
    pub fn load_description(path: &Path) -> Result<Self, LoadError> {
        debug!("Loading description '{}'", path.display());

        let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
        let desc: DescriptionIn =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| {
                LoadError::Description {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        Ok(Self::from_description(desc, path.to_path_buf()))
    }

    fn description(&self) -> DescriptionOut<'_> {
        DescriptionOut {
            comment: self.comment.as_deref(),
            package_size: self.package_size,
            entries: &self.entries,
        }
    }

    fn from_description(desc: DescriptionIn, package_path: PathBuf) -> Self {
        Self {
            entries: desc.entries,
            package_size: desc.package_size,
            package_path,
            comment: desc.comment,
            origin: Origin::Detached,
        }
    }
}

/// First occurrence of a name wins; later ones are reported and skipped
fn collect_entries(members: impl IntoIterator<Item = Member>) -> IndexMap<String, EntryProperties> {
    let mut entries = IndexMap::new();

    for Member { name, size } in members {
        match entries.entry(name) {
            Entry::Occupied(occupied) => {
                warn!("Duplicate APK file entry: {}", occupied.key());
            }
            Entry::Vacant(vacant) => {
                debug!("  {size:>12} {}", vacant.key());
                vacant.insert(EntryProperties { size });
            }
        }
    }

    entries
}
