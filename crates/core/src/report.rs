//! Output seam between the diff engine and whatever renders it

use color_eyre::Result;

use crate::diff::EntryDelta;
use crate::snapshot::Snapshot;

/// First line of every comparison report
pub const REPORT_HEADER: &str = "Size difference in bytes ([*1] apk1 only, [*2] apk2 only):";

/// Padding handed to deep comparators so nested lines are indented
pub const DEEP_PADDING: &str = "  ";

/// Receives a comparison as it is produced.
///
/// Deep comparator output for an entry happens between that entry's
/// [`entry`](ReportSink::entry) call and the next one.
pub trait ReportSink {
    fn header(&mut self) -> Result<()>;

    fn entry(&mut self, entry: &EntryDelta) -> Result<()>;

    fn summary(&mut self, first: &Snapshot, second: &Snapshot, package_delta: i64) -> Result<()>;
}

/// Signed, right-aligned delta: `+` for growth and zero, `-` for shrinkage
#[must_use]
pub fn format_delta(delta: i64) -> String {
    let sign = if delta < 0 { '-' } else { '+' };
    format!("{sign}{:>12}", delta.unsigned_abs())
}
