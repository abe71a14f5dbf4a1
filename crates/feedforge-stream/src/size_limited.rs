//! Cross-page size budget.

use std::sync::Arc;

use feedforge_core::{
    inappropriate_cursor, EnumerateContext, Result, Stream, StreamCursor, StreamMeta,
    StreamResult,
};

/// Caps the total number of elements served across all pages.
///
/// Cursor kind: [`StreamCursor::SizeLimited`]; each element records how many
/// elements had been served once it was emitted.
#[derive(Debug)]
pub struct SizeLimitedStream {
    meta: StreamMeta,
    inner: Arc<dyn Stream>,
    limit: usize,
}

impl SizeLimitedStream {
    pub fn new(meta: StreamMeta, inner: Arc<dyn Stream>, limit: usize) -> Self {
        Self { meta, inner, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Stream for SizeLimitedStream {
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
        let (inner_cursor, served) = match cursor {
            None => (None, 0),
            Some(StreamCursor::SizeLimited { inner, size }) => (inner.as_deref(), *size),
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        if served >= self.limit {
            return Ok(StreamResult::empty());
        }

        let want = count.min(self.limit - served);
        let page = self.inner.enumerate(want, inner_cursor, ctx)?;
        let delivered = page.len();
        let is_exhaustive =
            page.is_exhaustive() || delivered < want || served + delivered >= self.limit;

        let elements = page
            .into_elements()
            .into_iter()
            .take(want)
            .enumerate()
            .map(|(i, element)| {
                let cursor = StreamCursor::SizeLimited {
                    inner: element.cursor().cloned().map(Box::new),
                    size: served + i + 1,
                };
                element.derive(self.identity(), Some(cursor))
            })
            .collect();
        Ok(StreamResult::new(is_exhaustive, elements))
    }
}
