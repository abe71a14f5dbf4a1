//! Observer hooks for operator calls.
//!
//! A tracer receives begin/end/fail/skip notifications for every `enumerate`
//! call in the tree. Tracers observe only; they never alter control flow.
//!
//! # Usage
//!
//! ```
//! use std::time::Duration;
//! use feedforge_core::{StreamResult, StreamTracer};
//!
//! #[derive(Debug)]
//! struct PrintTracer;
//!
//! impl StreamTracer for PrintTracer {
//!     fn end_enumerate(&self, stream: &str, result: &StreamResult, elapsed: Duration) {
//!         println!("{stream}: {} elements in {elapsed:?}", result.len());
//!     }
//! }
//! ```

use std::fmt::Debug;
use std::time::Duration;

use crate::error::StreamError;
use crate::result::StreamResult;

/// Listener for per-operator enumeration events.
///
/// All methods default to no-ops, so implementors override only what they need.
pub trait StreamTracer: Send + Sync + Debug {
    /// Called before an operator runs its own enumeration.
    fn begin_enumerate(&self, _stream: &str, _count: usize) {}

    /// Called after an operator returned a page.
    fn end_enumerate(&self, _stream: &str, _result: &StreamResult, _elapsed: Duration) {}

    /// Called when an operator's enumeration failed.
    fn fail_enumerate(&self, _stream: &str, _error: &StreamError, _elapsed: Duration) {}

    /// Called when a disabled operator was skipped.
    fn skip_enumerate(&self, _stream: &str) {}
}
