//! Sequential concatenation of streams.

use std::sync::Arc;

use feedforge_config::ConcatenateConfig;
use feedforge_core::{
    inappropriate_cursor, try_enumerate_branch, EnumerateContext, EnumerateOptions, Result,
    Stream, StreamCursor, StreamMeta, StreamResult,
};
use tracing::debug;

/// Drains its sources in order, moving on only once a source is exhaustive.
///
/// Cursor kind: [`StreamCursor::Concatenated`], holding the source index and
/// that source's position. A failing source is logged and skipped.
///
/// With `stateful` set, each later source is bounded to elements strictly
/// older than the last element of the previous one. The bound travels in the
/// cursor, so it holds on every page after the switch.
#[derive(Debug)]
pub struct ConcatenatedStream {
    meta: StreamMeta,
    streams: Vec<Arc<dyn Stream>>,
    stateful: bool,
}

impl ConcatenatedStream {
    pub fn new(meta: StreamMeta, streams: Vec<Arc<dyn Stream>>) -> Self {
        Self {
            meta,
            streams,
            stateful: false,
        }
    }

    pub fn with_config(mut self, config: &ConcatenateConfig) -> Self {
        self.stateful = config.stateful;
        self
    }

    pub fn stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    pub fn streams(&self) -> &[Arc<dyn Stream>] {
        &self.streams
    }
}

impl Stream for ConcatenatedStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn is_enabled(&self) -> bool {
        !self.meta.is_skipped() && self.streams.iter().any(|s| s.is_enabled())
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let (mut source, mut inner_cursor, mut bound) = match cursor {
            None => (0, None, None),
            Some(StreamCursor::Concatenated {
                source,
                inner,
                before_ms,
            }) => (*source, inner.as_deref().cloned(), *before_ms),
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        let mut elements = Vec::with_capacity(count);

        while let Some(stream) = self.streams.get(source) {
            let options = match bound {
                Some(before_ms) => ctx
                    .options()
                    .intersect(&EnumerateOptions::new().with_before_ms(before_ms)),
                None => *ctx.options(),
            };
            let branch_ctx = ctx.with_options(options);
            let page = try_enumerate_branch(
                stream.as_ref(),
                count - elements.len(),
                inner_cursor.as_ref(),
                &branch_ctx,
            )?;
            let page_exhaustive = page.is_exhaustive();
            let is_last = source + 1 >= self.streams.len();
            let next_bound = match page.elements().last().and_then(|e| e.timestamp_ms()) {
                Some(timestamp) if self.stateful => tighten(bound, timestamp),
                _ => bound,
            };

            let page_len = page.len();
            for (i, element) in page.into_elements().into_iter().enumerate() {
                // The last element of a drained source hands over to the next
                // source, so the carried bound survives a page break.
                let cursor = if page_exhaustive && !is_last && i + 1 == page_len {
                    StreamCursor::Concatenated {
                        source: source + 1,
                        inner: None,
                        before_ms: next_bound,
                    }
                } else {
                    StreamCursor::Concatenated {
                        source,
                        inner: element.cursor().cloned().map(Box::new),
                        before_ms: bound,
                    }
                };
                elements.push(element.derive(self.identity(), Some(cursor)));
            }

            if elements.len() >= count || !page_exhaustive {
                return Ok(StreamResult::new(page_exhaustive && is_last, elements));
            }

            debug!(stream = self.identity(), source, "source exhausted, advancing");
            source += 1;
            inner_cursor = None;
            bound = next_bound;
        }

        Ok(StreamResult::new(true, elements))
    }
}

fn tighten(bound: Option<i64>, before_ms: i64) -> Option<i64> {
    Some(bound.map_or(before_ms, |current| current.min(before_ms)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedforge_core::StreamError;
    use feedforge_test::{drain, ids, FailingStream, ListStream};

    fn concat(streams: Vec<Arc<dyn Stream>>) -> Arc<dyn Stream> {
        Arc::new(ConcatenatedStream::new(StreamMeta::new("concat"), streams))
    }

    #[test]
    fn drains_sources_in_order_across_pages() {
        let a = Arc::new(ListStream::numbered("a", "a", 3));
        let b = Arc::new(ListStream::numbered("b", "b", 3));
        let stream = concat(vec![a, b.clone()]);

        let first = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert_eq!(ids(&first), vec!["a0", "a1"]);
        assert_eq!(b.call_count(), 0);

        let pages = drain(&stream, 2, 10).unwrap();
        let all: Vec<String> = pages.iter().flat_map(ids).collect();
        assert_eq!(all, vec!["a0", "a1", "a2", "b0", "b1", "b2"]);
        assert!(pages.last().unwrap().is_exhaustive());
    }

    #[test]
    fn single_page_spans_sources() {
        let stream = concat(vec![
            Arc::new(ListStream::numbered("a", "a", 2)),
            Arc::new(ListStream::numbered("b", "b", 5)),
        ]);
        let page = stream.enumerate(4, None, &EnumerateContext::new()).unwrap();
        assert_eq!(ids(&page), vec!["a0", "a1", "b0", "b1"]);
        assert!(!page.is_exhaustive());
        assert_eq!(
            page.combined_cursor().unwrap(),
            Some(StreamCursor::Concatenated {
                source: 1,
                inner: Some(Box::new(StreamCursor::offset(2))),
                before_ms: None,
            })
        );
    }

    #[test]
    fn failing_source_is_skipped() {
        let stream = concat(vec![
            Arc::new(FailingStream::new("down")),
            Arc::new(ListStream::numbered("b", "b", 2)),
        ]);
        let page = stream.enumerate(5, None, &EnumerateContext::new()).unwrap();
        assert_eq!(ids(&page), vec!["b0", "b1"]);
        assert!(page.is_exhaustive());
    }

    #[test]
    fn fatal_source_error_propagates() {
        let stream = concat(vec![
            Arc::new(FailingStream::fatal("broken")),
            Arc::new(ListStream::numbered("b", "b", 2)),
        ]);
        let err = stream
            .enumerate(5, None, &EnumerateContext::new())
            .unwrap_err();
        assert!(matches!(err, StreamError::InvalidArgument(_)));
    }

    #[test]
    fn stateful_concatenation_bounds_later_sources() {
        let recent = Arc::new(ListStream::timeline("recent", 2, 1_000, 100));
        let archive = Arc::new(ListStream::timeline("archive", 30, 2_000, 100));
        let stream = ConcatenatedStream::new(
            StreamMeta::new("concat"),
            vec![recent.clone(), archive.clone()],
        )
        .with_config(&ConcatenateConfig { stateful: true });

        let page = stream.enumerate(4, None, &EnumerateContext::new()).unwrap();
        let timestamps: Vec<_> = page
            .elements()
            .iter()
            .filter_map(|e| e.timestamp_ms())
            .collect();
        assert_eq!(timestamps, vec![1_000, 900, 800, 700]);

        let plain = concat(vec![
            Arc::new(ListStream::timeline("recent", 2, 1_000, 100)),
            Arc::new(ListStream::timeline("archive", 30, 2_000, 100)),
        ]);
        let page = plain.enumerate(3, None, &EnumerateContext::new()).unwrap();
        assert_eq!(page.elements()[2].timestamp_ms(), Some(2_000));
    }

    #[test]
    fn cursor_past_last_source_is_exhaustive() {
        let stream = concat(vec![Arc::new(ListStream::numbered("a", "a", 2))]);
        let cursor = StreamCursor::Concatenated {
            source: 3,
            inner: None,
            before_ms: None,
        };
        let page = stream
            .enumerate(2, Some(&cursor), &EnumerateContext::new())
            .unwrap();
        assert!(page.is_empty() && page.is_exhaustive());
    }

    fn stateful_timelines() -> Arc<dyn Stream> {
        Arc::new(
            ConcatenatedStream::new(
                StreamMeta::new("concat"),
                vec![
                    Arc::new(ListStream::timeline("recent", 2, 1_000, 100)),
                    Arc::new(ListStream::timeline("archive", 30, 2_000, 100)),
                ],
            )
            .stateful(true),
        )
    }

    fn timestamps(page: &StreamResult) -> Vec<i64> {
        page.elements()
            .iter()
            .filter_map(|e| e.timestamp_ms())
            .collect()
    }

    #[test]
    fn bound_survives_page_break_at_source_switch() {
        let stream = stateful_timelines();
        let ctx = EnumerateContext::new();

        let first = stream.enumerate(2, None, &ctx).unwrap();
        assert_eq!(ids(&first), vec!["recent0", "recent1"]);
        let cursor = first.combined_cursor().unwrap();
        assert_eq!(
            cursor,
            Some(StreamCursor::Concatenated {
                source: 1,
                inner: None,
                before_ms: Some(900),
            })
        );

        let second = stream.enumerate(2, cursor.as_ref(), &ctx).unwrap();
        assert_eq!(timestamps(&second), vec![800, 700]);
    }

    #[test]
    fn bound_survives_page_break_inside_later_source() {
        let stream = stateful_timelines();

        let pages = drain(&stream, 3, 3).unwrap();
        let served: Vec<i64> = pages.iter().flat_map(timestamps).collect();
        assert_eq!(served, vec![1_000, 900, 800, 700, 600, 500, 400, 300, 200]);
        assert!(served.windows(2).all(|pair| pair[0] > pair[1]));
    }
}
