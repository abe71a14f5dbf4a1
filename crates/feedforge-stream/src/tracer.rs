//! A tracer that forwards operator events to `tracing`.

use std::time::Duration;

use feedforge_core::{StreamError, StreamResult, StreamTracer};
use tracing::{debug, trace, warn};

/// Emits one `tracing` event per operator call.
///
/// Begin and end are `TRACE`, skips are `DEBUG` and failures are `WARN`,
/// so a default `info` filter only shows failures.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingTracer;

impl LoggingTracer {
    pub fn new() -> Self {
        Self
    }
}

impl StreamTracer for LoggingTracer {
    fn begin_enumerate(&self, stream: &str, count: usize) {
        trace!(stream, count, "enumerate begin");
    }

    fn end_enumerate(&self, stream: &str, result: &StreamResult, elapsed: Duration) {
        trace!(
            stream,
            returned = result.len(),
            exhaustive = result.is_exhaustive(),
            elapsed_us = elapsed.as_micros() as u64,
            "enumerate end"
        );
    }

    fn fail_enumerate(&self, stream: &str, error: &StreamError, elapsed: Duration) {
        warn!(
            stream,
            error = %error,
            fatal = error.is_fatal(),
            elapsed_us = elapsed.as_micros() as u64,
            "enumerate failed"
        );
    }

    fn skip_enumerate(&self, stream: &str) {
        debug!(stream, "enumerate skipped");
    }
}
