//! Leaf streams over fixed content.

use feedforge_core::{
    inappropriate_cursor, EnumerateContext, OriginalElement, Result, Stream, StreamCursor,
    StreamElement, StreamMeta, StreamResult,
};

/// Serves a fixed list of elements in order, resumed by offset.
///
/// Timestamped elements outside the requested time window are passed over.
///
/// # Example
///
/// ```
/// use feedforge_core::{EnumerateContext, OriginalElement, Stream, StreamMeta};
/// use feedforge_stream::StaticStream;
///
/// let stream = StaticStream::new(
///     StreamMeta::new("pinned"),
///     vec![OriginalElement::new("editorial", "welcome")],
/// );
/// let page = stream.enumerate(5, None, &EnumerateContext::new()).unwrap();
/// assert_eq!(page.len(), 1);
/// assert!(page.is_exhaustive());
/// ```
#[derive(Debug)]
pub struct StaticStream {
    meta: StreamMeta,
    elements: Vec<OriginalElement>,
}

impl StaticStream {
    pub fn new(meta: StreamMeta, elements: Vec<OriginalElement>) -> Self {
        Self { meta, elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Stream for StaticStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let start = match cursor {
            None => 0,
            Some(StreamCursor::Offset { offset }) => {
                usize::try_from(*offset).unwrap_or(usize::MAX)
            }
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        let window = ctx.options();
        let mut next = start.min(self.elements.len());
        let mut elements = Vec::with_capacity(count.min(self.elements.len()));
        for original in self.elements.iter().skip(next) {
            if elements.len() == count {
                break;
            }
            next += 1;
            if original.timestamp_ms().map_or(true, |ts| window.contains(ts)) {
                elements.push(
                    StreamElement::new(original.clone())
                        .derive(self.identity(), Some(StreamCursor::offset(next as u64))),
                );
            }
        }

        Ok(StreamResult::new(next >= self.elements.len(), elements))
    }
}

/// A stream that never produces anything.
#[derive(Debug)]
pub struct EmptyStream {
    meta: StreamMeta,
}

impl EmptyStream {
    pub fn new(meta: StreamMeta) -> Self {
        Self { meta }
    }
}

impl Stream for EmptyStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn enumerate_inner(
        &self,
        _count: usize,
        _cursor: Option<&StreamCursor>,
        _ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        Ok(StreamResult::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedforge_core::{EnumerateOptions, StreamError};
    use feedforge_test::{ids, timed_element};

    fn timeline() -> StaticStream {
        StaticStream::new(
            StreamMeta::new("timeline"),
            vec![
                timed_element("t", "a", 300),
                timed_element("t", "b", 200),
                timed_element("t", "c", 100),
            ],
        )
    }

    #[test]
    fn pages_by_offset() {
        let stream = timeline();
        let ctx = EnumerateContext::new();

        let first = stream.enumerate(2, None, &ctx).unwrap();
        assert_eq!(ids(&first), vec!["a", "b"]);
        assert!(!first.is_exhaustive());

        let cursor = first.combined_cursor().unwrap();
        let second = stream.enumerate(2, cursor.as_ref(), &ctx).unwrap();
        assert_eq!(ids(&second), vec!["c"]);
        assert!(second.is_exhaustive());
    }

    #[test]
    fn honors_time_window() {
        let stream = timeline();
        let ctx = EnumerateContext::new().with_options(EnumerateOptions::new().with_before_ms(300));

        let page = stream.enumerate(1, None, &ctx).unwrap();
        assert_eq!(ids(&page), vec!["b"]);
        assert_eq!(page.elements()[0].cursor(), Some(&StreamCursor::offset(2)));
    }

    #[test]
    fn rejects_foreign_cursor() {
        let err = timeline()
            .enumerate(1, Some(&StreamCursor::Cached { offset: 0 }), &EnumerateContext::new())
            .unwrap_err();
        assert!(matches!(err, StreamError::InappropriateCursor { .. }));
    }

    #[test]
    fn empty_stream_is_exhaustive() {
        let page = EmptyStream::new(StreamMeta::new("nothing"))
            .enumerate(3, None, &EnumerateContext::new())
            .unwrap();
        assert!(page.is_empty());
        assert!(page.is_exhaustive());
    }
}
