use thiserror::Error;

/// Blockzip-wide error type.
///
/// Covers every failure the pipeline can surface: format validation of archives, per-block
/// codec failures, worker pool lifecycle misuse and configuration problems.
#[derive(Error, Debug)]
pub enum BlockzipError {
    /// I/O operations on the input or output stream failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON configuration could not be parsed
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Input is not a gzip archive this tool can split into blocks
    #[error("Input archive should be in gzip format: {reason}")]
    InvalidFormat {
        reason: String,
    },

    /// Compressing or decompressing a single block failed
    #[error("Block {index} failed: {reason}")]
    BlockCodecFailure {
        index:  usize,
        reason: String,
    },

    /// A task was submitted after the worker pool was shut down
    #[error("Worker pool is closed")]
    PoolClosed,

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
    },

    /// Generic error for unexpected conditions
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl BlockzipError {
    /// Build an [`BlockzipError::InvalidFormat`] from any displayable reason.
    pub fn invalid_format<T: std::fmt::Display>(reason: T) -> Self {
        Self::InvalidFormat {
            reason: reason.to_string(),
        }
    }

    /// Build a [`BlockzipError::BlockCodecFailure`] for the block at `index`.
    pub fn block_failure<T: std::fmt::Display>(index: usize, reason: T) -> Self {
        Self::BlockCodecFailure {
            index,
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for blockzip operations.
pub type Result<T> = std::result::Result<T, BlockzipError>;
