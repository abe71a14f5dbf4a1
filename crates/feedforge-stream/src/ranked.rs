//! Re-ranking operators.

use std::collections::HashSet;
use std::sync::Arc;

use feedforge_config::BufferConfig;
use feedforge_core::{
    inappropriate_cursor, rank_or_original, EnumerateContext, Result, Stream, StreamCursor,
    StreamElement, StreamMeta, StreamRanker, StreamResult,
};
use tracing::debug;

/// Re-ranks each inner page on its own.
///
/// Cursors pass through unchanged, so ranking never affects pagination.
#[derive(Debug)]
pub struct RankedStream {
    meta: StreamMeta,
    inner: Arc<dyn Stream>,
    ranker: Arc<dyn StreamRanker>,
}

impl RankedStream {
    pub fn new(meta: StreamMeta, inner: Arc<dyn Stream>, ranker: Arc<dyn StreamRanker>) -> Self {
        Self {
            meta,
            inner,
            ranker,
        }
    }
}

impl Stream for RankedStream {
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
        let page = self.inner.enumerate(count, cursor, ctx)?;
        let is_exhaustive = page.is_exhaustive();
        let ranked = rank_or_original(self.ranker.as_ref(), page.into_elements(), ctx.tracer());
        let elements = ranked
            .into_iter()
            .map(|element| element.derive(self.identity(), element.cursor().cloned()))
            .collect();
        Ok(StreamResult::new(is_exhaustive, elements))
    }
}

/// Ranks over a buffer that outlives a single page.
///
/// Each call tops the buffer up to `max(buffer_size, count)` when it holds
/// fewer than `count` elements, ranks the whole buffer, and emits the top
/// `count`. The rest travels in the cursor.
///
/// Cursor kind: [`StreamCursor::Buffered`].
#[derive(Debug)]
pub struct BufferedRankedStream {
    meta: StreamMeta,
    inner: Arc<dyn Stream>,
    ranker: Arc<dyn StreamRanker>,
    buffer_size: usize,
}

impl BufferedRankedStream {
    pub fn new(meta: StreamMeta, inner: Arc<dyn Stream>, ranker: Arc<dyn StreamRanker>) -> Self {
        Self {
            meta,
            inner,
            ranker,
            buffer_size: BufferConfig::default().buffer_size,
        }
    }

    pub fn with_config(mut self, config: &BufferConfig) -> Self {
        self.buffer_size = config.buffer_size;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl Stream for BufferedRankedStream {
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
        let (mut buffer, mut inner_cursor) = match cursor {
            None => (Vec::new(), None),
            Some(StreamCursor::Buffered { buffer, inner }) => {
                (buffer.clone(), inner.as_deref().cloned())
            }
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        let mut inner_exhausted = false;
        if buffer.len() < count {
            let top_up = self.buffer_size.max(count) - buffer.len();
            let page = self.inner.enumerate(top_up, inner_cursor.as_ref(), ctx)?;
            inner_exhausted = page.is_exhaustive();
            inner_cursor =
                StreamCursor::combine(inner_cursor.as_ref(), page.combined_cursor()?.as_ref())?;

            let mut buffered: HashSet<String> = buffer.iter().map(StreamElement::key).collect();
            buffer.extend(
                page.into_elements()
                    .into_iter()
                    .filter(|element| buffered.insert(element.key())),
            );
            debug!(stream = self.identity(), buffered = buffer.len(), "buffer topped up");
        }

        let ranked = rank_or_original(self.ranker.as_ref(), buffer, ctx.tracer());
        let emitted = count.min(ranked.len());
        let is_exhaustive = inner_exhausted && ranked.len() <= count;

        let inner_box = inner_cursor.map(Box::new);
        let elements = ranked[..emitted]
            .iter()
            .enumerate()
            .map(|(i, element)| {
                let cursor = StreamCursor::Buffered {
                    buffer: ranked[i + 1..].to_vec(),
                    inner: inner_box.clone(),
                };
                element.derive(self.identity(), Some(cursor))
            })
            .collect();
        Ok(StreamResult::new(is_exhaustive, elements))
    }
}
