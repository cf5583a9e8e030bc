//! Error type for extraction, statistics and the main-thread bridge

use chunkmat_core::ChunkError;

/// Errors raised by the chunked matrix engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Grid, selection or cache contract failure from the core crate
    Core(ChunkError),
    /// First failure reported by a parallel worker
    Worker(String),
    /// Failure raised by a task executed on the main thread
    MainThread(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Core(err) => write!(f, "{err}"),
            Error::Worker(msg) => write!(f, "worker failed: {msg}"),
            Error::MainThread(msg) => write!(f, "main thread task failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ChunkError> for Error {
    fn from(err: ChunkError) -> Self {
        Error::Core(err)
    }
}

/// Result type for the chunked matrix engine
pub type Result<T> = core::result::Result<T, Error>;
