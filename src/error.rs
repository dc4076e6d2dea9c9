use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while tagging a batch of episodes
#[derive(Debug, Error)]
pub enum Error {
    #[error("Directory \"{}\" does not exist", path.display())]
    DirectoryNotFound { path: PathBuf },

    #[error("Invalid configuration file {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("{tool} failed on {}: {reason}", path.display())]
    Subprocess {
        tool: String,
        path: PathBuf,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn subprocess(
        tool: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Subprocess {
            tool: tool.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}
