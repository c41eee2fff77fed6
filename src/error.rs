use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("compression failed: {0}")]
    CompressionFailed(String),
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),
    #[error("incomplete chunk sequence: no chunk found at {0}.0")]
    IncompleteSequence(String),
    #[error("remote rejected `{action}`: {message}")]
    RemoteRejected { action: String, message: String },
    #[error("record `{0}` not found")]
    RecordNotFound(String),
    #[error(
        "record `{record}` already holds {top} node(s); run `reset` or `remove` before uploading"
    )]
    RecordNotEmpty { record: String, top: u64 },
    #[error("node {index} of record `{record}` not found")]
    NodeNotFound { record: String, index: u64 },
    #[error("record `{record}` is owned by `{owner}`, not `{account}`")]
    OwnerMismatch {
        record: String,
        owner: String,
        account: String,
    },
}

impl PipelineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Self::CompressionFailed(_) => "COMPRESSION_FAILED",
            Self::DecompressionFailed(_) => "DECOMPRESSION_FAILED",
            Self::CorruptArchive(_) => "CORRUPT_ARCHIVE",
            Self::IncompleteSequence(_) => "INCOMPLETE_SEQUENCE",
            Self::RemoteRejected { .. } => "REMOTE_REJECTED",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::RecordNotEmpty { .. } => "RECORD_NOT_EMPTY",
            Self::NodeNotFound { .. } => "NODE_NOT_FOUND",
            Self::OwnerMismatch { .. } => "OWNER_MISMATCH",
        }
    }
}

/// Find the pipeline failure behind an `anyhow` chain, if there is one.
pub fn pipeline_error(err: &anyhow::Error) -> Option<&PipelineError> {
    err.downcast_ref::<PipelineError>()
}
