//! Application context for pile-backed collections.
//!
//! Holds the one process-wide "current pile" that collections fall back to
//! when they are not given a pile explicitly, together with the memory
//! model and the TOML configuration that shape it.
//!
//! # Key Types
//!
//! - [`AppContext`] -- name, instance id, start time, memory model and pile
//! - [`AppConfig`] -- TOML-loadable configuration
//! - [`MemoryModel`] -- picks the default pile configuration

pub mod config;
pub mod context;
pub mod error;

pub use config::{AppConfig, MemoryModel};
pub use context::{
    current, current_pile, install, is_available, memory_model, set_memory_model, uninstall,
    AppContext,
};
pub use error::{AppError, AppResult};
