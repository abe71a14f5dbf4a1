//! In-memory leaf streams.
//!
//! # Example
//!
//! ```
//! use feedforge_core::{EnumerateContext, Stream};
//! use feedforge_test::source::ListStream;
//!
//! let stream = ListStream::with_ids("posts", &["a", "b", "c"]);
//! let page = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
//! assert_eq!(page.len(), 2);
//! assert!(!page.is_exhaustive());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use feedforge_core::{
    inappropriate_cursor, EnumerateContext, OriginalElement, Result, Stream, StreamCursor,
    StreamElement, StreamError, StreamMeta, StreamResult,
};

/// A stream over a fixed list of elements, resumed by offset.
///
/// Elements with a timestamp outside the requested time bounds are skipped.
/// Every call is recorded for assertions.
#[derive(Debug)]
pub struct ListStream {
    meta: StreamMeta,
    elements: Vec<OriginalElement>,
    calls: Mutex<Vec<(usize, Option<StreamCursor>)>>,
}

impl ListStream {
    pub fn new(identity: &str, elements: Vec<OriginalElement>) -> Self {
        Self::with_meta(StreamMeta::new(identity), elements)
    }

    pub fn with_meta(meta: StreamMeta, elements: Vec<OriginalElement>) -> Self {
        Self {
            meta,
            elements,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A stream whose elements are provided by `identity` with the given ids.
    pub fn with_ids(identity: &str, ids: &[&str]) -> Self {
        let elements = ids
            .iter()
            .map(|id| OriginalElement::new(identity, *id))
            .collect();
        Self::new(identity, elements)
    }

    /// `n` elements named `{prefix}{i}`.
    pub fn numbered(identity: &str, prefix: &str, n: usize) -> Self {
        let elements = (0..n)
            .map(|i| OriginalElement::new(identity, format!("{prefix}{i}")))
            .collect();
        Self::new(identity, elements)
    }

    /// `n` newest-first elements starting at `newest_ms`, `step_ms` apart.
    pub fn timeline(identity: &str, n: usize, newest_ms: i64, step_ms: i64) -> Self {
        let elements = (0..n)
            .map(|i| {
                OriginalElement::new(identity, format!("{identity}{i}"))
                    .with_timestamp(newest_ms - step_ms * i as i64)
            })
            .collect();
        Self::new(identity, elements)
    }

    /// Number of `enumerate_inner` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    /// Recorded `(count, cursor)` pairs.
    pub fn calls(&self) -> Vec<(usize, Option<StreamCursor>)> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl Stream for ListStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((count, cursor.cloned()));
        }

        let start = match cursor {
            None => 0,
            Some(StreamCursor::Offset { offset }) => *offset as usize,
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        let options = ctx.options();
        let mut elements = Vec::new();
        let mut index = start;
        while index < self.elements.len() && elements.len() < count {
            let original = &self.elements[index];
            index += 1;
            if original.timestamp_ms().is_some_and(|ts| !options.contains(ts)) {
                continue;
            }
            elements.push(
                StreamElement::new(original.clone())
                    .derive(self.identity(), Some(StreamCursor::offset(index as u64))),
            );
        }

        Ok(StreamResult::new(index >= self.elements.len(), elements))
    }
}

/// A stream that always fails with a degradable branch error.
#[derive(Debug)]
pub struct FailingStream {
    meta: StreamMeta,
    fatal: bool,
    calls: AtomicUsize,
}

impl FailingStream {
    pub fn new(identity: &str) -> Self {
        Self {
            meta: StreamMeta::new(identity),
            fatal: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A stream that always fails with a fatal error.
    pub fn fatal(identity: &str) -> Self {
        Self {
            fatal: true,
            ..Self::new(identity)
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Stream for FailingStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn enumerate_inner(
        &self,
        _count: usize,
        _cursor: Option<&StreamCursor>,
        _ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fatal {
            Err(StreamError::InvalidArgument(format!(
                "{} rejects every request",
                self.identity()
            )))
        } else {
            Err(StreamError::branch(self.identity(), "backend unavailable"))
        }
    }
}
