//! Per-entry size diffing between two snapshots

use std::fmt;

use color_eyre::Result;
use tracing::debug;

use crate::archive::PackageArchive;
use crate::registry::ComparatorRegistry;
use crate::report::{DEEP_PADDING, ReportSink, format_delta};
use crate::snapshot::Snapshot;

/// Which snapshots contain an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Both,
    /// Only in the first snapshot (`*1`)
    FirstOnly,
    /// Only in the second snapshot (`*2`)
    SecondOnly,
}

/// Size change of a single entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDelta {
    pub path: String,
    /// `second - first`, with a missing side counting as zero
    pub delta: i64,
    pub presence: Presence,
}

impl EntryDelta {
    /// Whether the entry exists on one side only
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.presence != Presence::Both
    }

    /// Report annotation for single entries
    #[must_use]
    pub fn marker(&self) -> Option<&'static str> {
        match self.presence {
            Presence::Both => None,
            Presence::FirstOnly => Some("*1"),
            Presence::SecondOnly => Some("*2"),
        }
    }
}

impl fmt::Display for EntryDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_delta(self.delta), self.path)?;
        if let Some(marker) = self.marker() {
            write!(f, " {marker}")?;
        }
        Ok(())
    }
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeDiff {
    /// Non-zero deltas, largest growth first
    pub entries: Vec<EntryDelta>,
    pub first_package_size: u64,
    pub second_package_size: u64,
}

impl SizeDiff {
    /// Compare `first` against `second`.
    ///
    /// Zero deltas are dropped. Equal deltas are ordered by path.
    #[must_use]
    pub fn compute(first: &Snapshot, second: &Snapshot) -> Self {
        let mut entries: Vec<_> = entry_deltas(first, second)
            .into_iter()
            .filter(|entry| entry.delta != 0)
            .collect();

        entries.sort_by(|a, b| b.delta.cmp(&a.delta).then_with(|| a.path.cmp(&b.path)));

        Self {
            entries,
            first_package_size: first.package_size(),
            second_package_size: second.package_size(),
        }
    }

    /// `second - first` package size
    #[must_use]
    pub fn package_delta(&self) -> i64 {
        signed_delta(self.first_package_size, self.second_package_size)
    }

    /// No entry changed size
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Deltas for every path in either snapshot, zero deltas included.
///
/// Paths of `first` come first in their order, then paths only in `second`.
#[must_use]
pub fn entry_deltas(first: &Snapshot, second: &Snapshot) -> Vec<EntryDelta> {
    let mut deltas = Vec::with_capacity(first.len().max(second.len()));

    for (path, props) in first.entries() {
        let delta = match second.get(path) {
            Some(other) => EntryDelta {
                path: path.clone(),
                delta: signed_delta(props.size, other.size),
                presence: Presence::Both,
            },
            None => EntryDelta {
                path: path.clone(),
                delta: signed_delta(props.size, 0),
                presence: Presence::FirstOnly,
            },
        };
        deltas.push(delta);
    }

    for (path, props) in second.entries() {
        if first.get(path).is_none() {
            deltas.push(EntryDelta {
                path: path.clone(),
                delta: signed_delta(0, props.size),
                presence: Presence::SecondOnly,
            });
        }
    }

    deltas
}

#[allow(clippy::cast_possible_wrap)]
fn signed_delta(from: u64, to: u64) -> i64 {
    to.wrapping_sub(from) as i64
}

/// Drives a comparison: size diff, report output and deep comparison
pub struct DiffEngine<'a> {
    registry: &'a ComparatorRegistry,
}

impl<'a> DiffEngine<'a> {
    #[must_use]
    pub fn new(registry: &'a ComparatorRegistry) -> Self {
        Self { registry }
    }

    /// Compare `first` against `second`, writing the report to `sink`.
    ///
    /// Entries present on both sides are deep-compared when both snapshots
    /// are live and a comparator is registered for the entry's extension.
    ///
    /// # Errors
    /// Returns an error if the sink, an extraction or a comparator fails
    pub fn run(
        &self,
        first: &Snapshot,
        second: &Snapshot,
        sink: &mut dyn ReportSink,
    ) -> Result<SizeDiff> {
        let diff = SizeDiff::compute(first, second);
        let archives = first.archive().zip(second.archive());

        sink.header()?;

        for entry in &diff.entries {
            sink.entry(entry)?;

            if entry.is_single() {
                continue;
            }
            if let Some((first_archive, second_archive)) = archives {
                self.deep_compare(first_archive, second_archive, &entry.path)?;
            }
        }

        sink.summary(first, second, diff.package_delta())?;

        Ok(diff)
    }

    /// Extract `path` from both archives into fresh temporary directories
    /// and hand the copies to the registered comparator.
    fn deep_compare(
        &self,
        first: &PackageArchive,
        second: &PackageArchive,
        path: &str,
    ) -> Result<()> {
        let Some(comparator) = self.registry.for_entry(path) else {
            return Ok(());
        };

        // Dropping a TempDir removes it, so early returns clean up too
        let first_dir = tempfile::tempdir()?;
        let second_dir = tempfile::tempdir()?;

        debug!(
            "Extracting '{path}' to {} and {} temporary directories",
            first_dir.path().display(),
            second_dir.path().display()
        );

        let first_file = first.extract(path, first_dir.path())?;
        let second_file = second.extract(path, second_dir.path())?;

        comparator.compare(&first_file, &second_file, DEEP_PADDING)?;

        first_dir.close()?;
        second_dir.close()?;

        Ok(())
    }
}
