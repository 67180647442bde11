use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{PileError, PileResult};
use crate::handle::Handle;

/// Copy-in/copy-out record store addressed by [`Handle`].
///
/// All implementations must satisfy these invariants:
/// - `put` never returns a handle that is currently live.
/// - `get` returns an independent copy. Two reads of the same handle never
///   alias each other, and mutating a copy never changes the stored record.
/// - Once a record is removed (or its segment released), every operation on
///   its handle fails with [`PileError::InvalidHandle`].
/// - Each single call is atomic. There are no multi-call transactions.
/// - Errors are propagated, never retried.
pub trait Pile: Send + Sync {
    /// Persist a copy of `data` and return its fresh handle.
    fn put(&self, data: &[u8]) -> PileResult<Handle>;

    /// Overwrite the record at `handle` with a copy of `data`.
    ///
    /// Fails with `InvalidHandle` if `handle` does not currently resolve.
    fn put_at(&self, handle: Handle, data: &[u8]) -> PileResult<()>;

    /// Read a copy of the record at `handle`.
    ///
    /// Fails with `InvalidHandle` if `handle` does not currently resolve.
    fn get(&self, handle: Handle) -> PileResult<Vec<u8>>;

    /// Release the record at `handle`. Returns `true` if it was live.
    fn remove(&self, handle: Handle) -> PileResult<bool>;

    /// Check whether `handle` currently resolves.
    ///
    /// Default implementation calls `get()` and discards the copy.
    fn contains(&self, handle: Handle) -> PileResult<bool> {
        match self.get(handle) {
            Ok(_) => Ok(true),
            Err(PileError::InvalidHandle(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Typed access on top of any [`Pile`], encoding values with `bincode`.
///
/// Implemented for every pile including `dyn Pile`, so callers can hold an
/// `Arc<dyn Pile>` and still read and write typed values.
pub trait PileExt: Pile {
    /// Encode `value` and persist it under a fresh handle.
    fn put_value<T: Serialize + ?Sized>(&self, value: &T) -> PileResult<Handle> {
        let bytes = encode(value)?;
        self.put(&bytes)
    }

    /// Encode `value` and overwrite the record at `handle`.
    fn put_value_at<T: Serialize + ?Sized>(&self, handle: Handle, value: &T) -> PileResult<()> {
        let bytes = encode(value)?;
        self.put_at(handle, &bytes)
    }

    /// Read and decode a copy of the record at `handle`.
    fn get_value<T: DeserializeOwned>(&self, handle: Handle) -> PileResult<T> {
        decode(&self.get(handle)?)
    }
}

impl<P: Pile + ?Sized> PileExt for P {}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode `value` the way [`PileExt`] stores it.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> PileResult<Vec<u8>> {
    codec()
        .serialize(value)
        .map_err(|e| PileError::Serialization(e.to_string()))
}

/// Decode bytes written by [`encode`]. The whole input must be consumed.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> PileResult<T> {
    codec()
        .deserialize(bytes)
        .map_err(|e| PileError::Serialization(e.to_string()))
}
