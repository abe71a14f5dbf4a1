//! The enumeration contract implemented by every operator.

use std::fmt::Debug;
use std::time::Instant;

use tracing::{trace, warn};

use crate::cursor::StreamCursor;
use crate::error::{Result, StreamError};
use crate::result::StreamResult;
use crate::tracer::StreamTracer;

/// Time bounds passed down the tree alongside a request.
///
/// A bounded stream should only return elements with
/// `after_ms <= timestamp < before_ms`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnumerateOptions {
    before_ms: Option<i64>,
    after_ms: Option<i64>,
}

impl EnumerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_before_ms(mut self, before_ms: i64) -> Self {
        self.before_ms = Some(before_ms);
        self
    }

    pub fn with_after_ms(mut self, after_ms: i64) -> Self {
        self.after_ms = Some(after_ms);
        self
    }

    pub fn before_ms(&self) -> Option<i64> {
        self.before_ms
    }

    pub fn after_ms(&self) -> Option<i64> {
        self.after_ms
    }

    /// Narrows these bounds by `other`; the tighter bound wins on each side.
    pub fn intersect(&self, other: &EnumerateOptions) -> Self {
        Self {
            before_ms: tighter(self.before_ms, other.before_ms, i64::min),
            after_ms: tighter(self.after_ms, other.after_ms, i64::max),
        }
    }

    /// Returns true if `timestamp_ms` falls inside the bounds.
    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.before_ms.map_or(true, |before| timestamp_ms < before)
            && self.after_ms.map_or(true, |after| timestamp_ms >= after)
    }
}

fn tighter(a: Option<i64>, b: Option<i64>, pick: fn(i64, i64) -> i64) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

/// Per-call context: the optional tracer and the enumeration options.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnumerateContext<'a> {
    tracer: Option<&'a dyn StreamTracer>,
    options: EnumerateOptions,
}

impl<'a> EnumerateContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracer(mut self, tracer: &'a dyn StreamTracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_options(mut self, options: EnumerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn tracer(&self) -> Option<&'a dyn StreamTracer> {
        self.tracer
    }

    pub fn options(&self) -> &EnumerateOptions {
        &self.options
    }
}

/// Identity, component tag and skip flag shared by every operator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamMeta {
    identity: String,
    component: Option<String>,
    skipped: bool,
}

impl StreamMeta {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            component: None,
            skipped: false,
        }
    }

    /// Sets the declarative component this operator belongs to.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Marks the operator as explicitly skipped.
    pub fn skipped(mut self, skipped: bool) -> Self {
        self.skipped = skipped;
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped
    }
}

/// An operator in the stream tree.
///
/// Implementors provide [`Stream::enumerate_inner`]; callers use
/// [`Stream::enumerate`], which enforces the contract around it:
///
/// - `count` must be positive, otherwise [`StreamError::InvalidArgument`] is
///   returned before the inner implementation runs.
/// - A disabled operator returns an exhaustive empty page and reports a skip.
/// - Every returned element is tagged with this operator's component unless a
///   deeper operator already tagged it.
pub trait Stream: Send + Sync + Debug {
    fn meta(&self) -> &StreamMeta;

    /// Stable identity, used as the branch key in multi-source cursors.
    fn identity(&self) -> &str {
        self.meta().identity()
    }

    /// Whether this operator currently produces anything.
    ///
    /// Wrapping operators also report disabled when their child is.
    fn is_enabled(&self) -> bool {
        !self.meta().is_skipped()
    }

    /// Operator-specific enumeration. Call [`Stream::enumerate`] instead.
    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult>;

    /// Returns up to `count` elements starting at `cursor`.
    fn enumerate(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let identity = self.identity();
        if count == 0 {
            return Err(StreamError::InvalidArgument(format!(
                "stream {identity} asked for a non-positive count"
            )));
        }

        if !self.is_enabled() {
            trace!(stream = identity, "stream disabled, skipping");
            if let Some(tracer) = ctx.tracer() {
                tracer.skip_enumerate(identity);
            }
            return Ok(StreamResult::empty());
        }

        if let Some(tracer) = ctx.tracer() {
            tracer.begin_enumerate(identity, count);
        }
        let started = Instant::now();

        match self.enumerate_inner(count, cursor, ctx) {
            Ok(result) => {
                let result = match self.meta().component() {
                    Some(component) => result.with_component(component),
                    None => result,
                };
                trace!(
                    stream = identity,
                    count,
                    returned = result.len(),
                    exhaustive = result.is_exhaustive(),
                    "enumerated"
                );
                if let Some(tracer) = ctx.tracer() {
                    tracer.end_enumerate(identity, &result, started.elapsed());
                }
                Ok(result)
            }
            Err(err) => {
                if let Some(tracer) = ctx.tracer() {
                    tracer.fail_enumerate(identity, &err, started.elapsed());
                }
                Err(err)
            }
        }
    }
}

/// Enumerates one branch of a fan-out operator, degrading non-fatal failures.
///
/// A degradable error is logged and replaced by an exhaustive empty page so
/// that sibling branches still contribute. Fatal errors propagate.
pub fn try_enumerate_branch(
    stream: &dyn Stream,
    count: usize,
    cursor: Option<&StreamCursor>,
    ctx: &EnumerateContext<'_>,
) -> Result<StreamResult> {
    match stream.enumerate(count, cursor, ctx) {
        Ok(result) => Ok(result),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!(stream = stream.identity(), error = %err, "branch failed, degrading to empty");
            Ok(StreamResult::empty())
        }
    }
}

/// Returns the fatal error for a cursor of the wrong kind.
pub fn inappropriate_cursor(stream: &dyn Stream, cursor: &StreamCursor) -> StreamError {
    StreamError::InappropriateCursor {
        stream: stream.identity().to_string(),
        found: cursor.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{OriginalElement, StreamElement};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct OneShot {
        meta: StreamMeta,
        calls: AtomicUsize,
        fail: Option<fn() -> StreamError>,
    }

    impl OneShot {
        fn new(meta: StreamMeta) -> Self {
            Self {
                meta,
                calls: AtomicUsize::new(0),
                fail: None,
            }
        }
    }

    impl Stream for OneShot {
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
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            let mut tagged = StreamElement::new(OriginalElement::new("p", "tagged"));
            tagged.set_component_if_absent("inner");
            Ok(StreamResult::new(
                false,
                vec![StreamElement::new(OriginalElement::new("p", "plain")), tagged],
            ))
        }
    }

    #[test]
    fn zero_count_never_reaches_inner() {
        let stream = OneShot::new(StreamMeta::new("one"));
        let err = stream.enumerate(0, None, &EnumerateContext::new()).unwrap_err();
        assert!(matches!(err, StreamError::InvalidArgument(_)));
        assert_eq!(stream.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn skipped_stream_returns_empty_exhaustive() {
        let stream = OneShot::new(StreamMeta::new("one").skipped(true));
        let result = stream.enumerate(5, None, &EnumerateContext::new()).unwrap();
        assert!(result.is_empty());
        assert!(result.is_exhaustive());
        assert_eq!(stream.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn component_is_stamped_unless_present() {
        let stream = OneShot::new(StreamMeta::new("one").with_component("outer"));
        let result = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert_eq!(result.elements()[0].component(), Some("outer"));
        assert_eq!(result.elements()[1].component(), Some("inner"));
    }

    #[test]
    fn branch_failures_degrade_but_fatal_errors_propagate() {
        let mut degradable = OneShot::new(StreamMeta::new("flaky"));
        degradable.fail = Some(|| StreamError::branch("flaky", "timeout"));
        let result =
            try_enumerate_branch(&degradable, 3, None, &EnumerateContext::new()).unwrap();
        assert!(result.is_empty() && result.is_exhaustive());

        let mut fatal = OneShot::new(StreamMeta::new("broken"));
        fatal.fail = Some(|| StreamError::InvalidArgument("bad".into()));
        assert!(try_enumerate_branch(&fatal, 3, None, &EnumerateContext::new()).is_err());
    }

    #[test]
    fn options_contain_and_intersect() {
        let a = EnumerateOptions::new().with_before_ms(100);
        let b = EnumerateOptions::new().with_before_ms(50).with_after_ms(10);
        let both = a.intersect(&b);
        assert_eq!(both.before_ms(), Some(50));
        assert_eq!(both.after_ms(), Some(10));
        assert!(both.contains(10));
        assert!(!both.contains(50));
        assert!(EnumerateOptions::new().contains(i64::MIN));
    }
}
