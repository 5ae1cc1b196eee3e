use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::ml::remote::RemoteError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("video source unavailable: {path:?}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("invalid video metadata: {0}")]
    InvalidMetadata(String),

    #[error("sampling interval must be positive, got {0:?}")]
    InvalidInterval(Duration),

    #[error("frame unreadable: {0}")]
    FrameUnreadable(String),

    #[error("image analysis unavailable: {0}")]
    AnalysisUnavailable(#[source] RemoteError),

    #[error("answer generation unavailable: {0}")]
    AnswererUnavailable(#[source] RemoteError),

    #[error("analysis store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),
}

impl PipelineError {
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
