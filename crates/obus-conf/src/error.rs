use std::collections::TryReserveError;
use std::path::PathBuf;

/// Outcome of a configuration load, as seen by the host process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    /// The file was read and every complete entry is installed.
    Ok,
    /// The file could not be read. Nothing is loaded; fall back to defaults.
    Warning,
    /// The file is structurally broken. Nothing is loaded and the
    /// configuration must be treated as unusable.
    Fatal,
}

impl LoadStatus {
    /// Returns `true` for [`LoadStatus::Fatal`].
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Fatal)
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfError {
    /// The file could not be opened.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading failed part-way through the input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A declaration's key is not valid UTF-8.
    #[error("invalid key on line {line}: keys must be valid UTF-8")]
    InvalidKey { line: usize },

    /// An array element declared a nested array.
    #[error("invalid array on line {line}: nested arrays are not allowed")]
    InvalidArray { line: usize },

    /// Growing a string or array value failed.
    #[error("out of memory on line {line}: {source}")]
    Allocation {
        line: usize,
        #[source]
        source: TryReserveError,
    },
}

impl ConfError {
    /// The [`LoadStatus`] a failed load reports for this error.
    pub fn status(&self) -> LoadStatus {
        match self {
            Self::Open { .. } | Self::Io(_) => LoadStatus::Warning,
            Self::InvalidKey { .. } | Self::InvalidArray { .. } | Self::Allocation { .. } => {
                LoadStatus::Fatal
            }
        }
    }
}

/// Result alias for configuration operations.
pub type ConfResult<T> = Result<T, ConfError>;
