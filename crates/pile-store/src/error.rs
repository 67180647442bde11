use crate::handle::Handle;

/// Errors from pile operations.
#[derive(Debug, thiserror::Error)]
pub enum PileError {
    /// The handle does not resolve: never allocated, already removed, or
    /// left stale by slot reuse or segment release.
    #[error("invalid handle: {0}")]
    InvalidHandle(Handle),

    /// The payload does not fit into a single segment.
    #[error("object of {size} bytes exceeds segment size {limit}")]
    ObjectTooLarge { size: u64, limit: u64 },

    /// Writing the payload would exceed the configured memory limit.
    #[error("out of space: {requested} bytes requested, limit is {limit}")]
    OutOfSpace { requested: u64, limit: u64 },

    /// Payload encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for pile operations.
pub type PileResult<T> = Result<T, PileError>;
