//! Shared test fixtures for FeedForge crates.
//!
//! This crate provides in-memory collaborators for testing operators.
//! It depends only on `feedforge-core` so every crate can use it as a
//! dev-dependency without cycles.
//!
//! - [`source`] - In-memory leaf streams (list, failing, fatal)
//! - [`cache`] - In-memory TTL cache store
//! - [`tracer`] - Tracer that records events
//! - [`elements`] - Element builders and page helpers
//!
//! # Usage
//!
//! Add as a dev-dependency in your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! feedforge-test = { workspace = true }
//! ```

pub mod cache;
pub mod elements;
pub mod source;
pub mod tracer;

pub use cache::MemoryCacheStore;
pub use elements::{drain, element, element_ids, ids, timed_element};
pub use source::{FailingStream, ListStream};
pub use tracer::{RecordingTracer, TraceEvent};
