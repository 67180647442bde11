//! Error types for pile-backed collections.

use pile_app::AppError;
use pile_store::{Handle, PileError};

use crate::record::{Link, RecordKind};

/// Errors that can occur during collection operations.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// The pile failed or a handle given by the caller did not resolve.
    #[error(transparent)]
    Pile(#[from] PileError),

    /// A stored link points at a record that no longer resolves. The chain
    /// is corrupt; the operation was aborted.
    #[error("broken {link} link: {node} points at missing record {target}")]
    BrokenLink {
        /// The record holding the bad link.
        node: Handle,
        /// Which link was followed.
        link: Link,
        /// The handle that failed to resolve.
        target: Handle,
    },

    /// The record at `handle` is not the kind of record expected.
    #[error("record {handle} is not a {expected} record")]
    UnexpectedRecord { handle: Handle, expected: RecordKind },

    /// `copy_to` destination cannot hold the list.
    #[error("destination too small: {required} slots required, {available} available")]
    CapacityExceeded { required: usize, available: usize },

    /// A node cannot be erased while it is linked into a list.
    #[error("node {0} is still linked into a list")]
    StillLinked(Handle),

    /// A structural invariant does not hold.
    #[error("corrupt list structure at {handle}: {reason}")]
    Corrupt { handle: Handle, reason: String },

    /// No pile was given and no application pile is available.
    #[error("no current pile: {0}")]
    NoCurrentPile(#[from] AppError),
}

/// Convenience alias for collection results.
pub type ListResult<T> = Result<T, ListError>;
