use super::*;
use crate::filters::{DedupFilter, PredicateFilter};
use feedforge_core::StreamError;
use feedforge_test::{drain, ids, ListStream};

fn even_index() -> Arc<dyn StreamFilter> {
    Arc::new(PredicateFilter::new("even", |e| {
        e.element_id()
            .trim_start_matches('n')
            .parse::<usize>()
            .map(|i| i % 2 == 0)
            .unwrap_or(false)
    }))
}

fn keep_all() -> Arc<dyn StreamFilter> {
    Arc::new(PredicateFilter::new("all", |_| true))
}

#[test]
fn retries_until_enough_elements_survive() {
    let source = Arc::new(ListStream::numbered("src", "n", 10));
    let stream = FilteredStream::new(StreamMeta::new("evens"), source.clone(), even_index());

    let page = stream.enumerate(3, None, &EnumerateContext::new()).unwrap();

    assert_eq!(ids(&page), vec!["n0", "n2", "n4"]);
    assert!(!page.is_exhaustive());
    let cursors: Vec<_> = source.calls().into_iter().map(|(_, c)| c).collect();
    assert_eq!(
        cursors,
        vec![
            None,
            Some(StreamCursor::offset(3)),
            Some(StreamCursor::offset(4))
        ]
    );
}

#[test]
fn retry_cursor_always_advances() {
    let source = Arc::new(ListStream::numbered("src", "n", 20));
    let none_pass: Arc<dyn StreamFilter> = Arc::new(PredicateFilter::new("none", |_| false));
    let stream = FilteredStream::new(StreamMeta::new("f"), source.clone(), none_pass)
        .with_retry_count(4);

    let page = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
    assert!(page.is_empty());

    let calls = source.calls();
    assert_eq!(calls.len(), 5);
    for pair in calls.windows(2) {
        assert_ne!(pair[0].1, pair[1].1);
    }
}

#[test]
fn stops_after_retry_budget() {
    let source = Arc::new(ListStream::numbered("src", "n", 10));
    let stream = FilteredStream::new(StreamMeta::new("evens"), source.clone(), even_index())
        .with_retry_count(0);

    let page = stream.enumerate(3, None, &EnumerateContext::new()).unwrap();
    assert_eq!(ids(&page), vec!["n0", "n2"]);
    assert!(!page.is_exhaustive());
    assert_eq!(source.call_count(), 1);
}

#[test]
fn empty_inner_page_ends_without_retry() {
    let source = Arc::new(ListStream::numbered("src", "n", 0));
    let stream = FilteredStream::new(StreamMeta::new("f"), source.clone(), keep_all());

    let page = stream.enumerate(5, None, &EnumerateContext::new()).unwrap();
    assert!(page.is_empty() && page.is_exhaustive());
    assert_eq!(source.call_count(), 1);
}

#[test]
fn overfetched_surplus_is_not_reported_exhaustive() {
    let source = Arc::new(ListStream::numbered("src", "n", 4));
    let stream: Arc<dyn Stream> = Arc::new(
        FilteredStream::new(StreamMeta::new("f"), source.clone(), keep_all())
            .with_overfetch_ratio(1.0),
    );

    let first = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
    assert_eq!(ids(&first), vec!["n0", "n1"]);
    assert!(!first.is_exhaustive());
    assert_eq!(source.calls()[0].0, 4);

    let pages = drain(&stream, 2, 5).unwrap();
    let all: Vec<String> = pages.iter().flat_map(ids).collect();
    assert_eq!(all, vec!["n0", "n1", "n2", "n3"]);
    assert!(pages.last().unwrap().is_exhaustive());
}

#[test]
fn never_returns_more_than_requested() {
    let source = Arc::new(ListStream::numbered("src", "n", 50));
    let stream = FilteredStream::new(StreamMeta::new("f"), source, even_index())
        .with_overfetch_ratio(3.0);
    for count in 1..8 {
        let page = stream.enumerate(count, None, &EnumerateContext::new()).unwrap();
        assert!(page.len() <= count);
    }
}

#[test]
fn filter_state_carries_across_pages() {
    let source = Arc::new(ListStream::with_ids("p", &["a", "b", "a", "c"]));
    let stream: Arc<dyn Stream> = Arc::new(FilteredStream::new(
        StreamMeta::new("dedup"),
        source,
        Arc::new(DedupFilter::new("dedup")),
    ));

    let pages = drain(&stream, 2, 5).unwrap();
    let all: Vec<String> = pages.iter().flat_map(ids).collect();
    assert_eq!(all, vec!["a", "b", "c"]);

    match pages[0].combined_cursor().unwrap() {
        Some(StreamCursor::Filtered { inner, state }) => {
            assert_eq!(inner.as_deref(), Some(&StreamCursor::offset(2)));
            assert_eq!(state, Some(StreamFilterState::seen_ids(["p/a", "p/b"])));
        }
        other => panic!("unexpected cursor {other:?}"),
    }
}

#[test]
fn foreign_cursor_is_fatal() {
    let source = Arc::new(ListStream::numbered("src", "n", 3));
    let stream = FilteredStream::new(StreamMeta::new("f"), source, keep_all());
    let err = stream
        .enumerate(1, Some(&StreamCursor::offset(1)), &EnumerateContext::new())
        .unwrap_err();
    assert!(matches!(err, StreamError::InappropriateCursor { .. }));
}

#[test]
fn inner_errors_propagate() {
    let source = Arc::new(feedforge_test::FailingStream::new("down"));
    let stream = FilteredStream::new(StreamMeta::new("f"), source, keep_all());
    assert!(stream.enumerate(1, None, &EnumerateContext::new()).is_err());
}

#[test]
fn disabled_inner_disables_filter() {
    let source = Arc::new(ListStream::with_meta(
        StreamMeta::new("src").skipped(true),
        Vec::new(),
    ));
    let stream = FilteredStream::new(StreamMeta::new("f"), source.clone(), keep_all());
    assert!(!stream.is_enabled());
    assert!(stream
        .enumerate(3, None, &EnumerateContext::new())
        .unwrap()
        .is_empty());
    assert_eq!(source.call_count(), 0);
}

#[test]
fn cursorless_variant_presents_inner_cursors() {
    let source = Arc::new(ListStream::numbered("src", "n", 10));
    let stream: Arc<dyn Stream> = Arc::new(CursorlessFilteredStream::new(
        StreamMeta::new("evens"),
        source,
        even_index(),
    ));

    let first = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
    assert_eq!(ids(&first), vec!["n0", "n2"]);
    assert_eq!(
        first.combined_cursor().unwrap(),
        Some(StreamCursor::offset(3))
    );

    let pages = drain(&stream, 2, 10).unwrap();
    let all: Vec<String> = pages.iter().flat_map(ids).collect();
    assert_eq!(all, vec!["n0", "n2", "n4", "n6", "n8"]);
}
