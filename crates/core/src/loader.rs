//! Snapshot loading from packages (.apk) and descriptions (.apkdesc)

use std::path::{Path, PathBuf};

use tracing::info;

use crate::archive::PackageArchive;
use crate::config::LoadOptions;
use crate::error::LoadError;
use crate::snapshot::Snapshot;

/// Extension of package archives
pub const PACKAGE_EXTENSION: &str = "apk";

/// Extension of saved snapshots
pub const DESCRIPTION_EXTENSION: &str = "apkdesc";

/// What a path on the command line refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Package,
    Description,
}

impl SnapshotKind {
    /// Classify `path` by its extension, ignoring case
    ///
    /// # Errors
    /// Returns [`LoadError::UnknownExtension`] for anything else
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            PACKAGE_EXTENSION => Ok(Self::Package),
            DESCRIPTION_EXTENSION => Ok(Self::Description),
            _ => {
                let shown = path
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                Err(LoadError::UnknownExtension(shown))
            }
        }
    }
}

/// Path of the description saved alongside `package`
#[must_use]
pub fn description_path(package: &Path) -> PathBuf {
    package.with_extension(DESCRIPTION_EXTENSION)
}

/// Builds snapshots from paths
#[derive(Debug, Default, Clone)]
pub struct SnapshotLoader {
    options: LoadOptions,
}

impl SnapshotLoader {
    #[must_use]
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    /// Load a snapshot from a package or a description
    ///
    /// # Errors
    /// Returns an error if the path is missing, has an unknown extension,
    /// or cannot be read
    pub fn load(&self, path: &Path) -> Result<Snapshot, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }

        match SnapshotKind::from_path(path)? {
            SnapshotKind::Package => self.load_package(path),
            SnapshotKind::Description => Snapshot::load_description(path),
        }
    }

    fn load_package(&self, path: &Path) -> Result<Snapshot, LoadError> {
        let archive = PackageArchive::open(path)?;
        let mut snapshot = Snapshot::from_archive(archive)?;

        if self.options.save_description {
            let desc_path = description_path(path);
            info!("Saving apk description to '{}'", desc_path.display());

            snapshot.set_comment(self.options.comment.clone());
            snapshot.save(&desc_path)?;
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{write_raw_package, write_test_package};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(
            SnapshotKind::from_path(Path::new("out/app.apk")).unwrap(),
            SnapshotKind::Package
        );
        assert_eq!(
            SnapshotKind::from_path(Path::new("APP.APK")).unwrap(),
            SnapshotKind::Package
        );
        assert_eq!(
            SnapshotKind::from_path(Path::new("app.ApkDesc")).unwrap(),
            SnapshotKind::Description
        );
    }

    #[test]
    fn test_unknown_extension() {
        let err = SnapshotKind::from_path(Path::new("app.aab")).unwrap_err();
        assert_eq!(err.to_string(), "Unknown file extension '.aab'");
        assert_eq!(err.exit_code(), 3);

        let err = SnapshotKind::from_path(Path::new("app")).unwrap_err();
        assert_eq!(err.to_string(), "Unknown file extension ''");
    }

    #[test]
    fn test_missing_file_checked_before_extension() {
        let dir = TempDir::new().unwrap();
        let err = SnapshotLoader::default()
            .load(&dir.path().join("missing.txt"))
            .unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)), "{err:?}");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_existing_file_with_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let err = SnapshotLoader::default().load(&path).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_load_package_saves_description() {
        let dir = TempDir::new().unwrap();
        let apk = dir.path().join("app.apk");
        write_test_package(&apk, &[("lib.so", &[0u8; 1000]), ("classes.dex", &[0u8; 5000])]);

        let loader = SnapshotLoader::new(LoadOptions {
            save_description: true,
            comment: Some("baseline".into()),
        });
        let live = loader.load(&apk).unwrap();
        assert!(live.is_live());

        let desc = dir.path().join("app.apkdesc");
        assert!(desc.exists());

        let saved = loader.load(&desc).unwrap();
        assert!(!saved.is_live());
        assert_eq!(saved.entries(), live.entries());
        assert_eq!(saved.package_size(), live.package_size());
        assert_eq!(saved.comment(), Some("baseline"));
    }

    #[test]
    fn test_load_package_without_save() {
        let dir = TempDir::new().unwrap();
        let apk = dir.path().join("app.apk");
        write_test_package(&apk, &[("a.txt", b"a")]);

        SnapshotLoader::default().load(&apk).unwrap();
        assert!(!description_path(&apk).exists());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_load_package_with_repeated_entry() {
        let dir = TempDir::new().unwrap();
        let apk = dir.path().join("dup.apk");
        write_raw_package(
            &apk,
            &[
                ("classes.dex", &[b'a'; 5000]),
                ("lib.so", &[0u8; 1000]),
                ("classes.dex", &[b'b'; 7000]),
            ],
        );

        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let snapshot = tracing::subscriber::with_default(subscriber, || {
            SnapshotLoader::default().load(&apk)
        })
        .unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("classes.dex").unwrap().size, 5000);
        assert_eq!(snapshot.get("lib.so").unwrap().size, 1000);
        let paths: Vec<_> = snapshot.entries().keys().map(String::as_str).collect();
        assert_eq!(paths, ["classes.dex", "lib.so"]);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Duplicate APK file entry: classes.dex"), "{output}");
    }
}
