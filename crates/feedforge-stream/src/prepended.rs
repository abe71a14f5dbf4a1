//! A fixed lead-in ahead of the first page.

use std::sync::Arc;

use feedforge_core::{
    inappropriate_cursor, try_enumerate_branch, EnumerateContext, Result, Stream, StreamCursor,
    StreamMeta, StreamResult,
};

/// Serves up to `limit` elements of `before` ahead of the first page of `after`.
///
/// The first page (no cursor) may therefore hold more than `count` elements.
/// Later pages come from `after` alone. A failing `before` branch is logged
/// and contributes nothing.
///
/// Cursor kind: [`StreamCursor::Prepended`], holding the `after` position.
#[derive(Debug)]
pub struct PrependedStream {
    meta: StreamMeta,
    before: Arc<dyn Stream>,
    after: Arc<dyn Stream>,
    limit: usize,
}

impl PrependedStream {
    pub fn new(
        meta: StreamMeta,
        before: Arc<dyn Stream>,
        after: Arc<dyn Stream>,
        limit: usize,
    ) -> Self {
        Self {
            meta,
            before,
            after,
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Stream for PrependedStream {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn is_enabled(&self) -> bool {
        !self.meta.is_skipped() && (self.before.is_enabled() || self.after.is_enabled())
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let after_cursor = match cursor {
            None => None,
            Some(StreamCursor::Prepended { after }) => after.as_deref().cloned(),
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        let mut elements = Vec::new();
        if cursor.is_none() && self.limit > 0 {
            let before = try_enumerate_branch(self.before.as_ref(), self.limit, None, ctx)?;
            elements.extend(before.into_elements().into_iter().map(|element| {
                element.derive(self.identity(), Some(StreamCursor::Prepended { after: None }))
            }));
        }

        let after = self.after.enumerate(count, after_cursor.as_ref(), ctx)?;
        let is_exhaustive = after.is_exhaustive();
        elements.extend(after.into_elements().into_iter().map(|element| {
            let cursor = StreamCursor::Prepended {
                after: element.cursor().cloned().map(Box::new),
            };
            element.derive(self.identity(), Some(cursor))
        }));

        Ok(StreamResult::new(is_exhaustive, elements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedforge_test::{drain, ids, FailingStream, ListStream};

    #[test]
    fn before_only_leads_the_first_page() {
        let before = Arc::new(ListStream::with_ids("pinned", &["p0", "p1", "p2"]));
        let after = Arc::new(ListStream::numbered("feed", "f", 5));
        let stream: Arc<dyn Stream> = Arc::new(PrependedStream::new(
            StreamMeta::new("prepended"),
            before.clone(),
            after,
            2,
        ));

        let pages = drain(&stream, 2, 10).unwrap();
        assert_eq!(ids(&pages[0]), vec!["p0", "p1", "f0", "f1"]);
        assert_eq!(ids(&pages[1]), vec!["f2", "f3"]);
        assert_eq!(ids(&pages[2]), vec!["f4"]);
        assert!(pages[2].is_exhaustive());
        assert_eq!(before.call_count(), 1);
    }

    #[test]
    fn failing_before_does_not_affect_after() {
        let stream = PrependedStream::new(
            StreamMeta::new("prepended"),
            Arc::new(FailingStream::new("pinned")),
            Arc::new(ListStream::numbered("feed", "f", 5)),
            3,
        );
        let page = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert_eq!(ids(&page), vec!["f0", "f1"]);
    }

    #[test]
    fn empty_after_still_marks_first_page_served() {
        let stream = PrependedStream::new(
            StreamMeta::new("prepended"),
            Arc::new(ListStream::with_ids("pinned", &["p0"])),
            Arc::new(ListStream::numbered("feed", "f", 0)),
            1,
        );
        let page = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert_eq!(ids(&page), vec!["p0"]);
        assert!(page.is_exhaustive());
        assert_eq!(
            page.combined_cursor().unwrap(),
            Some(StreamCursor::Prepended { after: None })
        );
    }
}
