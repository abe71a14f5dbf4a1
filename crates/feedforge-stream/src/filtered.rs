//! Filter-with-retry operators.
//!
//! Both operators over-fetch from their inner stream, apply a filter, and
//! retry with an advanced inner cursor until enough elements survive, the
//! inner stream runs dry, or the retry budget is spent.

use std::sync::Arc;

use feedforge_config::FilterConfig;
use feedforge_core::{
    inappropriate_cursor, EnumerateContext, Result, Stream, StreamCursor, StreamElement,
    StreamFilter, StreamFilterState, StreamMeta, StreamResult,
};
use tracing::debug;

/// Retry policy shared by the filtered operators.
#[derive(Clone, Copy, Debug, PartialEq)]
struct RetryPolicy {
    retry_count: usize,
    overfetch_ratio: f64,
}

impl RetryPolicy {
    fn from_config(config: &FilterConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            overfetch_ratio: config.overfetch_ratio,
        }
    }

    fn fetch_count(&self, want: usize) -> usize {
        let ratio = if self.overfetch_ratio.is_finite() {
            self.overfetch_ratio.max(0.0)
        } else {
            0.0
        };
        let fetch = (want as f64 * (1.0 + ratio)).ceil() as usize;
        fetch.max(want).max(1)
    }
}

/// Retained inner elements, each paired with the cumulative filter state
/// after it, plus the exhaustion verdict.
struct Retained {
    elements: Vec<(StreamElement, Option<StreamFilterState>)>,
    is_exhaustive: bool,
}

#[allow(clippy::too_many_arguments)]
fn filter_with_retry(
    identity: &str,
    inner: &dyn Stream,
    filter: &dyn StreamFilter,
    policy: RetryPolicy,
    count: usize,
    mut inner_cursor: Option<StreamCursor>,
    mut state: Option<StreamFilterState>,
    ctx: &EnumerateContext<'_>,
) -> Result<Retained> {
    let mut retained = Vec::with_capacity(count);
    let mut attempt = 0;

    loop {
        let want = count - retained.len();
        let fetch_count = policy.fetch_count(want);
        let page = inner.enumerate(fetch_count, inner_cursor.as_ref(), ctx)?;
        if page.is_empty() {
            return Ok(Retained {
                elements: retained,
                is_exhaustive: true,
            });
        }

        let next_cursor =
            StreamCursor::combine(inner_cursor.as_ref(), page.combined_cursor()?.as_ref())?;
        let inner_exhausted = page.is_exhaustive() || next_cursor.is_none();

        let result = filter.filter(page.into_elements(), state.as_ref(), ctx.tracer())?;
        let kept = result.retained().len();
        let overflow = kept > want;
        debug!(
            stream = identity,
            attempt,
            fetched = fetch_count,
            kept,
            released = result.released().len(),
            "filter pass"
        );

        let mut running = state.clone();
        for element in result.retained().iter().take(want) {
            running = StreamFilterState::merge(running.as_ref(), result.state_for(element))?;
            retained.push((element.clone(), running.clone()));
        }

        let satisfied = retained.len() >= count;
        if satisfied || inner_exhausted || attempt >= policy.retry_count {
            return Ok(Retained {
                elements: retained,
                is_exhaustive: inner_exhausted && !overflow,
            });
        }

        attempt += 1;
        inner_cursor = next_cursor;
        state = running;
    }
}

/// Filters an inner stream, carrying filter state across pages.
///
/// Cursor kind: [`StreamCursor::Filtered`], holding the inner position and
/// the filter state accumulated up to each element.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use feedforge_core::{EnumerateContext, OriginalElement, Stream, StreamMeta};
/// use feedforge_stream::{FilteredStream, PredicateFilter, StaticStream};
///
/// let source = StaticStream::new(
///     StreamMeta::new("numbers"),
///     (0..10).map(|i| OriginalElement::new("numbers", i.to_string())).collect(),
/// );
/// let even = PredicateFilter::new("even", |e| {
///     e.element_id().parse::<u32>().map(|n| n % 2 == 0).unwrap_or(false)
/// });
/// let stream = FilteredStream::new(StreamMeta::new("evens"), Arc::new(source), Arc::new(even));
///
/// let page = stream.enumerate(3, None, &EnumerateContext::new()).unwrap();
/// let ids: Vec<_> = page.elements().iter().map(|e| e.element_id()).collect();
/// assert_eq!(ids, vec!["0", "2", "4"]);
/// ```
#[derive(Debug)]
pub struct FilteredStream {
    meta: StreamMeta,
    inner: Arc<dyn Stream>,
    filter: Arc<dyn StreamFilter>,
    policy: RetryPolicy,
}

impl FilteredStream {
    /// Creates a filtered stream with the default retry policy.
    pub fn new(meta: StreamMeta, inner: Arc<dyn Stream>, filter: Arc<dyn StreamFilter>) -> Self {
        Self {
            meta,
            inner,
            filter,
            policy: RetryPolicy::from_config(&FilterConfig::default()),
        }
    }

    /// Applies retry count and overfetch ratio from configuration.
    pub fn with_config(mut self, config: &FilterConfig) -> Self {
        self.policy = RetryPolicy::from_config(config);
        self
    }

    pub fn with_retry_count(mut self, retry_count: usize) -> Self {
        self.policy.retry_count = retry_count;
        self
    }

    pub fn with_overfetch_ratio(mut self, overfetch_ratio: f64) -> Self {
        self.policy.overfetch_ratio = overfetch_ratio;
        self
    }

    pub fn retry_count(&self) -> usize {
        self.policy.retry_count
    }

    pub fn overfetch_ratio(&self) -> f64 {
        self.policy.overfetch_ratio
    }

    pub fn inner(&self) -> &Arc<dyn Stream> {
        &self.inner
    }
}

impl Stream for FilteredStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn is_enabled(&self) -> bool {
        !self.meta.is_skipped() && self.inner.is_enabled()
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let (inner_cursor, state) = match cursor {
            None => (None, None),
            Some(StreamCursor::Filtered { inner, state }) => {
                (inner.as_deref().cloned(), state.clone())
            }
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        let retained = filter_with_retry(
            self.identity(),
            self.inner.as_ref(),
            self.filter.as_ref(),
            self.policy,
            count,
            inner_cursor,
            state,
            ctx,
        )?;

        let elements = retained
            .elements
            .into_iter()
            .map(|(element, state)| {
                let cursor = StreamCursor::Filtered {
                    inner: element.cursor().cloned().map(Box::new),
                    state,
                };
                element.derive(self.identity(), Some(cursor))
            })
            .collect();
        Ok(StreamResult::new(retained.is_exhaustive, elements))
    }
}

/// Filters an inner stream with a stateless filter.
///
/// Presents the inner stream's own cursors, so it can be dropped into an
/// existing tree without changing the cursor shape seen by callers.
#[derive(Debug)]
pub struct CursorlessFilteredStream {
    meta: StreamMeta,
    inner: Arc<dyn Stream>,
    filter: Arc<dyn StreamFilter>,
    policy: RetryPolicy,
}

impl CursorlessFilteredStream {
    pub fn new(meta: StreamMeta, inner: Arc<dyn Stream>, filter: Arc<dyn StreamFilter>) -> Self {
        Self {
            meta,
            inner,
            filter,
            policy: RetryPolicy::from_config(&FilterConfig::default()),
        }
    }

    pub fn with_config(mut self, config: &FilterConfig) -> Self {
        self.policy = RetryPolicy::from_config(config);
        self
    }

    pub fn with_retry_count(mut self, retry_count: usize) -> Self {
        self.policy.retry_count = retry_count;
        self
    }

    pub fn with_overfetch_ratio(mut self, overfetch_ratio: f64) -> Self {
        self.policy.overfetch_ratio = overfetch_ratio;
        self
    }
}

impl Stream for CursorlessFilteredStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn is_enabled(&self) -> bool {
        !self.meta.is_skipped() && self.inner.is_enabled()
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let retained = filter_with_retry(
            self.identity(),
            self.inner.as_ref(),
            self.filter.as_ref(),
            self.policy,
            count,
            cursor.cloned(),
            None,
            ctx,
        )?;

        let elements = retained
            .elements
            .into_iter()
            .map(|(element, _)| element.derive(self.identity(), element.cursor().cloned()))
            .collect();
        Ok(StreamResult::new(retained.is_exhaustive, elements))
    }
}

#[cfg(test)]
#[path = "filtered_tests.rs"]
mod tests;
