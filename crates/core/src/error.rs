//! Loader errors that map onto process exit codes

use std::path::PathBuf;

use thiserror::Error;

/// Failures while turning a path into a [`Snapshot`](crate::Snapshot)
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File '{}' does not exist.", .0.display())]
    NotFound(PathBuf),

    #[error("Unknown file extension '{0}'")]
    UnknownExtension(String),

    #[error("Unable to read package '{}': {source}", path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Unable to read description '{}': {source}", path.display())]
    Description {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Process exit code for this failure
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::NotFound(_) => 2,
            Self::UnknownExtension(_) => 3,
            Self::Archive { .. } | Self::Description { .. } | Self::Io { .. } => 1,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(LoadError::NotFound(PathBuf::from("a.apk")).exit_code(), 2);
        assert_eq!(LoadError::UnknownExtension(".txt".into()).exit_code(), 3);
        let io = LoadError::io("a.apk", std::io::Error::other("boom"));
        assert_eq!(io.exit_code(), 1);
    }

    #[test]
    fn test_not_found_message() {
        let err = LoadError::NotFound(PathBuf::from("missing.apk"));
        assert_eq!(err.to_string(), "File 'missing.apk' does not exist.");
    }
}
