//! Splices planned injections into an inner stream's pages.

use std::sync::Arc;

use feedforge_core::{
    inappropriate_cursor, EnumerateContext, InjectionPlan, MultiCursor, Result, Stream,
    StreamCursor, StreamInjector, StreamMeta, StreamResult,
};
use tracing::{debug, warn};

/// Wraps an inner stream and inserts injector-planned elements into each page.
///
/// The injector is asked for a plan before the inner stream runs, and the
/// inner stream is asked only for the slots the plan leaves over. A failing
/// plan degrades to no injections. Inner failures propagate.
///
/// Cursor kind: [`StreamCursor::Multi`], holding the inner cursor under the
/// inner identity and the injector state. Injected elements carry the cursor
/// of the whole page.
#[derive(Debug)]
pub struct InjectedStream {
    meta: StreamMeta,
    inner: Arc<dyn Stream>,
    injector: Arc<dyn StreamInjector>,
}

impl InjectedStream {
    pub fn new(meta: StreamMeta, inner: Arc<dyn Stream>, injector: Arc<dyn StreamInjector>) -> Self {
        Self {
            meta,
            inner,
            injector,
        }
    }

    fn plan(&self, count: usize, multi: &MultiCursor, ctx: &EnumerateContext<'_>) -> InjectionPlan {
        match self.injector.plan_injection(
            count,
            self.identity(),
            multi.injector_state(),
            ctx.tracer(),
        ) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(stream = self.identity(), error = %err, "injection planning failed");
                InjectionPlan::empty()
            }
        }
    }
}

impl Stream for InjectedStream {
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
        let multi = match cursor {
            None => MultiCursor::new(),
            Some(StreamCursor::Multi(multi)) => multi.clone(),
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        let plan = self.plan(count, &multi, ctx);
        let fetch = count.saturating_sub(plan.len()).max(1);
        debug!(
            stream = self.identity(),
            planned = plan.len(),
            fetch,
            "fetching around injections"
        );

        let page = self
            .inner
            .enumerate(fetch, multi.cursor_for_stream(self.inner.as_ref()), ctx)?;
        let is_exhaustive = page.is_exhaustive();

        let next_state = plan
            .injector_state()
            .or(multi.injector_state())
            .cloned();
        let mut running = multi.with_injector_state(next_state);
        let mut elements = Vec::with_capacity(page.len() + plan.len());
        for element in page.into_elements() {
            running = running.advance(self.inner.identity(), element.cursor())?;
            elements.push(
                element.derive(self.identity(), Some(StreamCursor::Multi(running.clone()))),
            );
        }

        let page_cursor = StreamCursor::Multi(running);
        let hosted = StreamResult::new(is_exhaustive, elements);
        Ok(plan.apply_with(hosted, ctx.tracer(), |element| {
            element.derive(self.identity(), Some(page_cursor.clone()))
        }))
    }
}
