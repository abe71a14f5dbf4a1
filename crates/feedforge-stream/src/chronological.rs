//! Time-ordered operators.
//!
//! - [`ChronologicalStreamMixer`] merges several timelines into one.
//! - [`ChronologicalBackfillStream`] continues a timeline from an older source.
//! - [`ChronologicalRangedStream`] restricts a timeline to a time window.

use std::cmp::Reverse;
use std::fmt::Debug;
use std::sync::Arc;

use feedforge_config::{ChronologicalConfig, ChronologicalOrder};
use feedforge_core::{
    inappropriate_cursor, try_enumerate_branch, EnumerateContext, EnumerateOptions, MultiCursor,
    Result, Stream, StreamCursor, StreamElement, StreamMeta, StreamResult, StreamTracer,
};
use tracing::{debug, warn};

/// Bulk pre-fetch over the merged candidates before they are sorted.
///
/// Used to warm caches for data the caller will need for every candidate.
/// A failing hook is logged and ignored.
pub trait PrefetchHook: Send + Sync + Debug {
    fn prefetch(&self, elements: &[StreamElement], tracer: Option<&dyn StreamTracer>)
        -> Result<()>;
}

fn multi_cursor(stream: &dyn Stream, cursor: Option<&StreamCursor>) -> Result<MultiCursor> {
    match cursor {
        None => Ok(MultiCursor::new()),
        Some(StreamCursor::Multi(multi)) => Ok(multi.clone()),
        Some(other) => Err(inappropriate_cursor(stream, other)),
    }
}

/// Merges child timelines by element timestamp.
///
/// Every child is asked for `count` elements. Untimestamped elements are
/// dropped. The merged list is sorted in the configured order and truncated.
///
/// Cursor kind: [`StreamCursor::Multi`], one entry per child identity.
#[derive(Debug)]
pub struct ChronologicalStreamMixer {
    meta: StreamMeta,
    streams: Vec<Arc<dyn Stream>>,
    order: ChronologicalOrder,
    prefetch: Option<Arc<dyn PrefetchHook>>,
}

impl ChronologicalStreamMixer {
    pub fn new(meta: StreamMeta, streams: Vec<Arc<dyn Stream>>) -> Self {
        Self {
            meta,
            streams,
            order: ChronologicalOrder::default(),
            prefetch: None,
        }
    }

    pub fn with_config(mut self, config: &ChronologicalConfig) -> Self {
        self.order = config.order;
        self
    }

    pub fn with_order(mut self, order: ChronologicalOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_prefetch(mut self, hook: Arc<dyn PrefetchHook>) -> Self {
        self.prefetch = Some(hook);
        self
    }
}

impl Stream for ChronologicalStreamMixer {
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
        let multi = multi_cursor(self, cursor)?;

        let mut candidates: Vec<(usize, StreamElement)> = Vec::new();
        for (branch, stream) in self.streams.iter().enumerate() {
            let page = try_enumerate_branch(
                stream.as_ref(),
                count,
                multi.cursor_for_stream(stream.as_ref()),
                ctx,
            )?;
            candidates.extend(
                page.into_elements()
                    .into_iter()
                    .filter(|element| element.timestamp_ms().is_some())
                    .map(|element| (branch, element)),
            );
        }

        if let Some(hook) = &self.prefetch {
            let elements: Vec<StreamElement> =
                candidates.iter().map(|(_, e)| e.clone()).collect();
            if let Err(err) = hook.prefetch(&elements, ctx.tracer()) {
                warn!(stream = self.identity(), error = %err, "prefetch failed");
            }
        }

        match self.order {
            ChronologicalOrder::Ascending => candidates.sort_by_key(|(_, e)| e.timestamp_ms()),
            ChronologicalOrder::Descending => {
                candidates.sort_by_key(|(_, e)| Reverse(e.timestamp_ms()))
            }
        }
        candidates.truncate(count);

        let mut running = multi;
        let mut elements = Vec::with_capacity(candidates.len());
        for (branch, element) in candidates {
            running = running.advance(self.streams[branch].identity(), element.cursor())?;
            elements.push(
                element.derive(self.identity(), Some(StreamCursor::Multi(running.clone()))),
            );
        }

        let is_exhaustive = elements.len() < count;
        Ok(StreamResult::new(is_exhaustive, elements))
    }
}

const FLOOR_BRANCH: &str = "backfill_floor";

/// A newest-first timeline continued by an older source.
///
/// Once `primary` runs dry, `backfill` fills the rest of the page, bounded
/// to elements strictly older than the oldest primary element served.
///
/// Cursor kind: [`StreamCursor::Multi`] keyed by the two child identities,
/// plus a timestamp floor.
#[derive(Debug)]
pub struct ChronologicalBackfillStream {
    meta: StreamMeta,
    primary: Arc<dyn Stream>,
    backfill: Arc<dyn Stream>,
}

impl ChronologicalBackfillStream {
    pub fn new(meta: StreamMeta, primary: Arc<dyn Stream>, backfill: Arc<dyn Stream>) -> Self {
        Self {
            meta,
            primary,
            backfill,
        }
    }
}

impl Stream for ChronologicalBackfillStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn is_enabled(&self) -> bool {
        !self.meta.is_skipped() && (self.primary.is_enabled() || self.backfill.is_enabled())
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let mut running = multi_cursor(self, cursor)?;
        let mut elements = Vec::with_capacity(count);

        let primary = try_enumerate_branch(
            self.primary.as_ref(),
            count,
            running.cursor_for_stream(self.primary.as_ref()),
            ctx,
        )?;
        let primary_exhaustive = primary.is_exhaustive();
        for element in primary.into_elements() {
            running = running.advance(self.primary.identity(), element.cursor())?;
            if let Some(timestamp) = element.timestamp_ms() {
                let floor = StreamCursor::timestamp(timestamp);
                running = running.advance(FLOOR_BRANCH, Some(&floor))?;
            }
            elements.push(
                element.derive(self.identity(), Some(StreamCursor::Multi(running.clone()))),
            );
        }

        if elements.len() >= count || !primary_exhaustive {
            return Ok(StreamResult::new(false, elements));
        }

        let floor = running
            .cursor_for(FLOOR_BRANCH)
            .and_then(StreamCursor::timestamp_ms);
        let mut options = *ctx.options();
        if let Some(floor) = floor {
            options = options.intersect(&EnumerateOptions::new().with_before_ms(floor));
        }
        debug!(stream = self.identity(), ?floor, "primary exhausted, backfilling");

        let backfill = try_enumerate_branch(
            self.backfill.as_ref(),
            count - elements.len(),
            running.cursor_for_stream(self.backfill.as_ref()),
            &ctx.with_options(options),
        )?;
        let is_exhaustive = backfill.is_exhaustive();
        for element in backfill.into_elements() {
            running = running.advance(self.backfill.identity(), element.cursor())?;
            let in_range = match (floor, element.timestamp_ms()) {
                (Some(floor), Some(timestamp)) => timestamp < floor,
                _ => true,
            };
            if in_range {
                elements.push(
                    element.derive(self.identity(), Some(StreamCursor::Multi(running.clone()))),
                );
            }
        }

        Ok(StreamResult::new(is_exhaustive, elements))
    }
}

/// Restricts an inner timeline to `after_ms <= timestamp < before_ms`.
///
/// The window is passed down to the inner stream and enforced again on the
/// way up. Untimestamped elements pass through. Cursors are the inner ones.
#[derive(Debug)]
pub struct ChronologicalRangedStream {
    meta: StreamMeta,
    inner: Arc<dyn Stream>,
    range: EnumerateOptions,
}

impl ChronologicalRangedStream {
    pub fn new(meta: StreamMeta, inner: Arc<dyn Stream>, range: EnumerateOptions) -> Self {
        Self { meta, inner, range }
    }

    pub fn range(&self) -> &EnumerateOptions {
        &self.range
    }
}

impl Stream for ChronologicalRangedStream {
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
        let window = ctx.options().intersect(&self.range);
        let page = self
            .inner
            .enumerate(count, cursor, &ctx.with_options(window))?;
        let is_exhaustive = page.is_exhaustive();
        let elements = page
            .into_elements()
            .into_iter()
            .filter(|element| element.timestamp_ms().map_or(true, |ts| window.contains(ts)))
            .map(|element| element.derive(self.identity(), element.cursor().cloned()))
            .collect();
        Ok(StreamResult::new(is_exhaustive, elements))
    }
}

#[cfg(test)]
#[path = "chronological_tests.rs"]
mod tests;
