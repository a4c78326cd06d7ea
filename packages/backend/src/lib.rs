//! Store-backed persistence for the workflow system.
//!
//! This crate keeps task and workflow definitions, jobs and the job queue,
//! and runner liveness records in a key-value/list/set store. All
//! coordination between runner processes goes through the store's atomic
//! primitives; nothing is cached between calls.
//!
//! # Features
//!
//! - `redis`: Enable `redis://` endpoints. Without it only the in-process
//!   `mem://` store is available.

mod codec;
mod config;
mod connection;
mod error;
mod integrity;
mod keys;
pub mod repositories;
pub mod store;

pub use config::{BackendConfig, DEFAULT_CONCURRENCY};
pub use connection::{Backend, connect};
pub use error::BackendError;
pub use integrity::Role;
pub use keys::Keys;
