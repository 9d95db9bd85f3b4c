//! apkdiff-core: APK size comparison engine
//!
//! Provides package snapshots, snapshot persistence, per-entry size diffing,
//! per-extension deep comparison and the size regression policy.

pub mod archive;
pub mod config;
pub mod diff;
pub mod error;
pub mod loader;
pub mod policy;
pub mod registry;
pub mod report;
pub mod snapshot;

pub use archive::{Member, PackageArchive};
pub use config::{ApkdiffConfig, LoadOptions};
pub use diff::{DiffEngine, EntryDelta, Presence, SizeDiff};
pub use error::LoadError;
pub use loader::{SnapshotKind, SnapshotLoader};
pub use policy::{Regression, RegressionPolicy, Thresholds, Verdict};
pub use registry::{ComparatorRegistry, EntryComparator};
pub use report::ReportSink;
pub use snapshot::{EntryProperties, Origin, Snapshot};
