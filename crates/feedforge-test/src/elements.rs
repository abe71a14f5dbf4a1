//! Element builders and page helpers.

use std::sync::Arc;

use feedforge_core::{
    EnumerateContext, OriginalElement, Result, Stream, StreamCursor, StreamElement, StreamResult,
};

/// Builds an original element with no timestamp.
pub fn element(provider_id: &str, element_id: &str) -> OriginalElement {
    OriginalElement::new(provider_id, element_id)
}

/// Builds an original element with a timestamp.
pub fn timed_element(provider_id: &str, element_id: &str, timestamp_ms: i64) -> OriginalElement {
    OriginalElement::new(provider_id, element_id).with_timestamp(timestamp_ms)
}

/// Element ids of a page, in order.
pub fn ids(result: &StreamResult) -> Vec<String> {
    result
        .elements()
        .iter()
        .map(|e| e.element_id().to_string())
        .collect()
}

/// Element ids of a slice of elements, in order.
pub fn element_ids(elements: &[StreamElement]) -> Vec<String> {
    elements.iter().map(|e| e.element_id().to_string()).collect()
}

/// Pages through `stream` by folding each page into the next cursor.
///
/// Stops on an exhaustive page or after `max_pages`. Returns every page.
pub fn drain(
    stream: &Arc<dyn Stream>,
    page_size: usize,
    max_pages: usize,
) -> Result<Vec<StreamResult>> {
    let ctx = EnumerateContext::new();
    let mut cursor: Option<StreamCursor> = None;
    let mut pages = Vec::new();
    for _ in 0..max_pages {
        let page = stream.enumerate(page_size, cursor.as_ref(), &ctx)?;
        let done = page.is_exhaustive();
        cursor = StreamCursor::combine(cursor.as_ref(), page.combined_cursor()?.as_ref())?;
        pages.push(page);
        if done {
            break;
        }
    }
    Ok(pages)
}
