//! apkdiff configuration: project file (.apkdiff.toml) and runtime options

use std::path::Path;

use crate::policy::Thresholds;

/// Optional defaults read from the working directory
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct ApkdiffConfig {
    /// Fail when the package grows by more than this many bytes
    pub apk_regression_threshold: Option<u64>,

    /// Accepted for parity with the command line; not enforced
    pub assembly_regression_threshold: Option<u64>,

    /// Comment stored in saved descriptions
    pub comment: Option<String>,
}

/// Config file name
pub const CONFIG_FILE: &str = ".apkdiff.toml";

impl ApkdiffConfig {
    /// Load config from `root`.
    ///
    /// Returns default config if .apkdiff.toml doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(root: &Path) -> color_eyre::Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Thresholds from this file, with explicit values taking precedence
    #[must_use]
    pub fn thresholds(&self, apk: Option<u64>, assembly: Option<u64>) -> Thresholds {
        Thresholds {
            package: apk.or(self.apk_regression_threshold).unwrap_or(0),
            assembly: assembly
                .or(self.assembly_regression_threshold)
                .unwrap_or(0),
        }
    }
}

/// Options consumed by [`SnapshotLoader`](crate::SnapshotLoader)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Write an .apkdesc next to every loaded package
    pub save_description: bool,
    /// Comment embedded in saved descriptions
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
apk_regression_threshold = 51200
assembly_regression_threshold = 4096
comment = "CI baseline"
"#;

        let config: ApkdiffConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.apk_regression_threshold, Some(51200));
        assert_eq!(config.assembly_regression_threshold, Some(4096));
        assert_eq!(config.comment.as_deref(), Some("CI baseline"));
    }

    #[test]
    fn test_parse_empty_config() {
        let config: ApkdiffConfig = toml::from_str("").unwrap();
        assert_eq!(config, ApkdiffConfig::default());
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = ApkdiffConfig::load(dir.path()).unwrap();
        assert_eq!(config, ApkdiffConfig::default());
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "apk_regression_threshold = \"big\"").unwrap();
        assert!(ApkdiffConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_command_line_overrides_file() {
        let config = ApkdiffConfig {
            apk_regression_threshold: Some(100),
            assembly_regression_threshold: Some(10),
            comment: None,
        };

        let thresholds = config.thresholds(Some(500), None);
        assert_eq!(thresholds.package, 500);
        assert_eq!(thresholds.assembly, 10);

        let unset = ApkdiffConfig::default().thresholds(None, None);
        assert_eq!(unset, Thresholds::default());
    }
}
