//! Per-extension deep comparison of extracted entries

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use color_eyre::Result;

/// Compares two extracted copies of the same entry and reports on its own
pub trait EntryComparator {
    /// `padding` is prepended to every line the comparator prints
    fn compare(&self, first: &Path, second: &Path, padding: &str) -> Result<()>;
}

/// Maps a normalized extension (lower-case, leading dot) to a comparator
#[derive(Default)]
pub struct ComparatorRegistry {
    comparators: HashMap<String, Box<dyn EntryComparator>>,
}

impl fmt::Debug for ComparatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<_> = self.comparators.keys().collect();
        extensions.sort();
        f.debug_struct("ComparatorRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

impl ComparatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `comparator` for `extension`, replacing any previous one.
    ///
    /// `"DLL"`, `"dll"` and `".dll"` all register the same key.
    pub fn register(
        &mut self,
        extension: &str,
        comparator: impl EntryComparator + 'static,
    ) -> &mut Self {
        self.comparators
            .insert(normalize_extension(extension), Box::new(comparator));
        self
    }

    /// Comparator for `extension`, if any
    #[must_use]
    pub fn lookup(&self, extension: &str) -> Option<&dyn EntryComparator> {
        self.comparators
            .get(&normalize_extension(extension))
            .map(|comparator| &**comparator)
    }

    /// Comparator for the extension of the entry at `path`
    #[must_use]
    pub fn for_entry(&self, path: &str) -> Option<&dyn EntryComparator> {
        entry_extension(path).and_then(|ext| self.lookup(&ext))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comparators.is_empty()
    }
}

/// Lower-case `extension` and make sure it starts with a dot
#[must_use]
pub fn normalize_extension(extension: &str) -> String {
    let lower = extension.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

/// Normalized extension of an entry path, `None` when it has none
#[must_use]
pub fn entry_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl EntryComparator for Noop {
        fn compare(&self, _first: &Path, _second: &Path, _padding: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("DLL"), ".dll");
        assert_eq!(normalize_extension(".So"), ".so");
        assert_eq!(normalize_extension(".dex"), ".dex");
    }

    #[test]
    fn test_entry_extension() {
        assert_eq!(
            entry_extension("assemblies/Mono.Android.DLL").as_deref(),
            Some(".dll")
        );
        assert_eq!(entry_extension("META-INF/MANIFEST"), None);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = ComparatorRegistry::new();
        registry.register("dll", Noop);

        assert!(registry.lookup(".dll").is_some());
        assert!(registry.lookup("DLL").is_some());
        assert!(registry.for_entry("assemblies/App.Dll").is_some());
    }

    #[test]
    fn test_unregistered_extension_is_none() {
        let mut registry = ComparatorRegistry::new();
        registry.register(".dll", Noop);

        assert!(registry.lookup(".so").is_none());
        assert!(registry.for_entry("lib/arm64-v8a/libmonodroid.so").is_none());
        assert!(registry.for_entry("LICENSE").is_none());
        assert!(ComparatorRegistry::new().is_empty());
    }
}
