//! Handle-addressed record store ("the pile").
//!
//! A pile maps opaque [`Handle`]s to byte records with copy semantics:
//! writing copies the caller's data in, reading copies it back out. Nothing
//! handed out by a pile aliases what it stores, so changing a record always
//! takes an explicit write-back.
//!
//! # Storage Backends
//!
//! All backends implement the [`Pile`] trait; [`PileExt`] layers typed,
//! `bincode`-encoded access on top of any of them:
//!
//! - [`InMemoryPile`] -- segmented slot store for tests and embedding
//!
//! # Design Rules
//!
//! 1. `put` never hands out a live handle; reused slots carry a new generation.
//! 2. Removed records, stale generations and released segments all resolve to
//!    [`PileError::InvalidHandle`].
//! 3. Every single call is atomic; there are no multi-call transactions.
//! 4. The pile never interprets record contents.
//! 5. All errors are propagated, never retried.

pub mod config;
pub mod error;
pub mod handle;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{AllocationMode, PileConfig};
pub use error::{PileError, PileResult};
pub use handle::Handle;
pub use memory::{InMemoryPile, PileStats};
pub use traits::{decode, encode, Pile, PileExt};
