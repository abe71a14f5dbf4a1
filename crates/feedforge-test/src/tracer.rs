//! A tracer that records every event for later assertions.

use std::sync::Mutex;
use std::time::Duration;

use feedforge_core::{StreamError, StreamResult, StreamTracer};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceEvent {
    Begin { stream: String, count: usize },
    End { stream: String, returned: usize },
    Fail { stream: String },
    Skip { stream: String },
}

#[derive(Debug, Default)]
pub struct RecordingTracer {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Identities of streams that began an enumeration, in call order.
    pub fn begun(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TraceEvent::Begin { stream, .. } => Some(stream),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl StreamTracer for RecordingTracer {
    fn begin_enumerate(&self, stream: &str, count: usize) {
        self.push(TraceEvent::Begin {
            stream: stream.to_string(),
            count,
        });
    }

    fn end_enumerate(&self, stream: &str, result: &StreamResult, _elapsed: Duration) {
        self.push(TraceEvent::End {
            stream: stream.to_string(),
            returned: result.len(),
        });
    }

    fn fail_enumerate(&self, stream: &str, _error: &StreamError, _elapsed: Duration) {
        self.push(TraceEvent::Fail {
            stream: stream.to_string(),
        });
    }

    fn skip_enumerate(&self, stream: &str) {
        self.push(TraceEvent::Skip {
            stream: stream.to_string(),
        });
    }
}
