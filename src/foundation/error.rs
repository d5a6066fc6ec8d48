use std::path::{Path, PathBuf};

pub type TimelapseResult<T> = Result<T, TimelapseError>;

/// Every failure the pipeline can observe.
///
/// The first four variants are per-frame and recoverable: the pipeline records them and keeps
/// going with a degraded descriptor or a shorter frame list. The rest end the run.
#[derive(thiserror::Error, Debug)]
pub enum TimelapseError {
    #[error("metadata read error for '{}': {reason}", path.display())]
    MetadataRead { path: PathBuf, reason: String },

    #[error("file time error for '{}': {reason}", path.display())]
    FileTime { path: PathBuf, reason: String },

    #[error("dimension read error for '{}': {reason}", path.display())]
    DimensionRead { path: PathBuf, reason: String },

    #[error("render error for '{}': {reason}", path.display())]
    Render { path: PathBuf, reason: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TimelapseError {
    pub fn metadata_read(path: &Path, reason: impl ToString) -> Self {
        Self::MetadataRead {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn file_time(path: &Path, reason: impl ToString) -> Self {
        Self::FileTime {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn dimension_read(path: &Path, reason: impl ToString) -> Self {
        Self::DimensionRead {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn render(path: &Path, reason: impl ToString) -> Self {
        Self::Render {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// `true` for failures that degrade a single frame without ending the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MetadataRead { .. }
                | Self::FileTime { .. }
                | Self::DimensionRead { .. }
                | Self::Render { .. }
        )
    }
}
