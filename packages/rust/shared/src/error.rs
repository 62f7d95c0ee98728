//! Error types for classref.
//!
//! Library crates use [`ClassrefError`] via `thiserror`.
//! The CLI wraps it with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all classref operations.
#[derive(Debug, thiserror::Error)]
pub enum ClassrefError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The PO catalog could not be read or parsed. Fatal to a run.
    #[error("cannot load catalog {path:?}: {message}")]
    CatalogLoad { path: PathBuf, message: String },

    /// A class-reference document is structurally invalid.
    #[error("malformed document{}: {message}", path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    MalformedDoc {
        path: Option<PathBuf>,
        message: String,
    },

    /// Writing a rendered Markdown file failed.
    #[error("cannot write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Filesystem I/O error while reading inputs.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad threshold, bad URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ClassrefError>;

impl ClassrefError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a catalog load error for `path`.
    pub fn catalog(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::CatalogLoad {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a malformed-document error not yet tied to a file.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDoc {
            path: None,
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a `std::io::Error` raised while writing output.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Attach the originating file to a [`ClassrefError::MalformedDoc`].
    ///
    /// Other variants are returned unchanged.
    pub fn with_path(self, file: impl Into<PathBuf>) -> Self {
        match self {
            Self::MalformedDoc { path: None, message } => Self::MalformedDoc {
                path: Some(file.into()),
                message,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ClassrefError::config("threshold out of range");
        assert_eq!(err.to_string(), "config error: threshold out of range");

        let err = ClassrefError::malformed("root element is <foo>");
        assert_eq!(err.to_string(), "malformed document: root element is <foo>");
    }

    #[test]
    fn malformed_error_gains_path() {
        let err = ClassrefError::malformed("missing name").with_path("doc/Broken.xml");
        let text = err.to_string();
        assert!(text.contains("doc/Broken.xml"), "{text}");
        assert!(text.contains("missing name"));
    }

    #[test]
    fn with_path_leaves_other_variants() {
        let err = ClassrefError::validation("nope").with_path("x.xml");
        assert!(matches!(err, ClassrefError::Validation { .. }));
    }
}
