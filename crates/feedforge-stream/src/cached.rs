//! Read-through caching of an inner stream's candidates.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use feedforge_config::CacheConfig;
use feedforge_core::{
    inappropriate_cursor, CacheStore, EnumerateContext, EnumerateOptions, Result, Stream,
    StreamCursor, StreamError, StreamMeta, StreamResult,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

const CACHE_KIND: &str = "stream_result";

/// Serves one page out of a cached candidate list.
pub trait CachePagination: Send + Sync + Debug {
    fn paginate(
        &self,
        host: &str,
        candidates: &StreamResult,
        count: usize,
        cursor: Option<&StreamCursor>,
    ) -> Result<StreamResult>;
}

/// Pages through the candidates in order, resuming by offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OffsetPagination;

impl CachePagination for OffsetPagination {
    fn paginate(
        &self,
        host: &str,
        candidates: &StreamResult,
        count: usize,
        cursor: Option<&StreamCursor>,
    ) -> Result<StreamResult> {
        let start = match cursor {
            None => 0,
            Some(StreamCursor::Cached { offset }) => *offset,
            Some(other) => {
                return Err(StreamError::InappropriateCursor {
                    stream: host.to_string(),
                    found: other.kind(),
                })
            }
        };
        let all = candidates.elements();
        let start = start.min(all.len());
        let end = start.saturating_add(count).min(all.len());
        let elements = all[start..end]
            .iter()
            .enumerate()
            .map(|(i, element)| {
                element.derive(
                    host,
                    Some(StreamCursor::Cached {
                        offset: start + i + 1,
                    }),
                )
            })
            .collect();
        Ok(StreamResult::new(end >= all.len(), elements))
    }
}

/// Caches the first `candidate_count` elements of an inner stream.
///
/// On a miss the inner stream is enumerated from the start and the page is
/// written back; every page is then cut from the candidate list by the
/// pagination strategy. The store is best-effort: read failures count as
/// misses and write failures are logged. Inner failures propagate.
///
/// The cache key covers the inner identity, the candidate count, the time
/// bounds of the call and any extra key components, such as the viewer.
#[derive(Debug)]
pub struct CachedStream {
    meta: StreamMeta,
    inner: Arc<dyn Stream>,
    store: Arc<dyn CacheStore>,
    pagination: Arc<dyn CachePagination>,
    config: CacheConfig,
    components: Vec<String>,
}

impl CachedStream {
    pub fn new(
        meta: StreamMeta,
        inner: Arc<dyn Stream>,
        store: Arc<dyn CacheStore>,
        pagination: Arc<dyn CachePagination>,
    ) -> Self {
        Self {
            meta,
            inner,
            store,
            pagination,
            config: CacheConfig::default(),
            components: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: &CacheConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Adds components to the cache key.
    pub fn with_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.components.extend(components.into_iter().map(Into::into));
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Hex SHA-256 over the framed key parts for a call under `options`.
    pub fn cache_key(&self, options: &EnumerateOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"feedforge.cache:v2");
        write_str(&mut hasher, self.inner.identity());
        hasher.update((self.config.candidate_count as u64).to_be_bytes());
        write_bound(&mut hasher, options.before_ms());
        write_bound(&mut hasher, options.after_ms());
        for component in &self.components {
            write_str(&mut hasher, component);
        }
        format!("{:x}", hasher.finalize())
    }

    fn lookup(&self, key: &str) -> Option<StreamResult> {
        let raw = match self.store.get(CACHE_KIND, key) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(stream = self.identity(), error = %err, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(candidates) => Some(candidates),
            Err(err) => {
                warn!(stream = self.identity(), error = %err, "discarding undecodable cache entry");
                None
            }
        }
    }

    fn write_back(&self, key: &str, candidates: &StreamResult) {
        let ttl: Duration = if candidates.is_empty() {
            self.config.empty_ttl()
        } else {
            self.config.ttl()
        };
        let written = serde_json::to_string(candidates)
            .map_err(StreamError::from)
            .and_then(|value| self.store.set(CACHE_KIND, key, value, ttl));
        if let Err(err) = written {
            warn!(stream = self.identity(), error = %err, "cache write failed");
        }
    }

    fn candidates(&self, ctx: &EnumerateContext<'_>) -> Result<StreamResult> {
        let key = self.cache_key(ctx.options());
        if let Some(candidates) = self.lookup(&key) {
            debug!(stream = self.identity(), candidates = candidates.len(), "cache hit");
            return Ok(candidates);
        }
        debug!(stream = self.identity(), "cache miss");
        let fetched = self
            .inner
            .enumerate(self.config.candidate_count.max(1), None, ctx)?;
        self.write_back(&key, &fetched);
        Ok(fetched)
    }
}

fn write_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

fn write_bound(hasher: &mut Sha256, bound: Option<i64>) {
    match bound {
        Some(value) => {
            hasher.update([1]);
            hasher.update(value.to_be_bytes());
        }
        None => hasher.update([0]),
    }
}

impl Stream for CachedStream {
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
        // Checked before the store is touched.
        if let Some(other) = cursor.filter(|c| !matches!(c, StreamCursor::Cached { .. })) {
            return Err(inappropriate_cursor(self, other));
        }
        let candidates = self.candidates(ctx)?;
        self.pagination
            .paginate(self.identity(), &candidates, count, cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedforge_test::{drain, ids, ListStream, MemoryCacheStore};

    fn config(candidate_count: usize) -> CacheConfig {
        CacheConfig {
            candidate_count,
            ttl_secs: 600,
            empty_ttl_cap_secs: 20,
        }
    }

    fn cached(inner: Arc<dyn Stream>, store: Arc<MemoryCacheStore>) -> CachedStream {
        CachedStream::new(StreamMeta::new("cached"), inner, store, Arc::new(OffsetPagination))
            .with_config(&config(4))
    }

    #[test]
    fn second_page_is_served_from_cache() {
        let inner = Arc::new(ListStream::numbered("posts", "p", 10));
        let store = Arc::new(MemoryCacheStore::new());
        let stream: Arc<dyn Stream> = Arc::new(cached(inner.clone(), store.clone()));

        let pages = drain(&stream, 3, 5).unwrap();
        assert_eq!(ids(&pages[0]), vec!["p0", "p1", "p2"]);
        assert_eq!(ids(&pages[1]), vec!["p3"]);
        assert!(pages[1].is_exhaustive());
        assert_eq!(inner.call_count(), 1);
        assert_eq!(store.set_count(), 1);
        assert_eq!(inner.calls()[0], (4, None));
    }

    #[test]
    fn lossy_store_falls_back_to_inner() {
        let inner = Arc::new(ListStream::numbered("posts", "p", 10));
        let stream: Arc<dyn Stream> =
            Arc::new(cached(inner.clone(), Arc::new(MemoryCacheStore::lossy())));

        let pages = drain(&stream, 2, 5).unwrap();
        let all: Vec<String> = pages.iter().flat_map(ids).collect();
        assert_eq!(all, vec!["p0", "p1", "p2", "p3"]);
        assert_eq!(inner.call_count(), 2);
    }

    #[test]
    fn broken_store_is_not_fatal() {
        let inner = Arc::new(ListStream::numbered("posts", "p", 10));
        let stream = cached(inner, Arc::new(MemoryCacheStore::broken()));

        let page = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert_eq!(ids(&page), vec!["p0", "p1"]);
    }

    #[test]
    fn disabled_inner_bypasses_store() {
        let inner = Arc::new(ListStream::with_meta(
            StreamMeta::new("posts").skipped(true),
            Vec::new(),
        ));
        let store = Arc::new(MemoryCacheStore::new());
        let stream = cached(inner, store.clone());

        let page = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert!(page.is_empty());
        assert_eq!(store.get_count(), 0);
    }

    #[test]
    fn empty_pages_use_capped_ttl() {
        let store = Arc::new(MemoryCacheStore::new());
        let stream = cached(Arc::new(ListStream::numbered("posts", "p", 0)), store.clone());

        stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert_eq!(
            store.ttl_of(CACHE_KIND, &stream.cache_key(&EnumerateOptions::new())),
            Some(Duration::from_secs(20))
        );
    }

    #[test]
    fn key_depends_on_components() {
        let inner: Arc<dyn Stream> = Arc::new(ListStream::numbered("posts", "p", 1));
        let store = Arc::new(MemoryCacheStore::new());
        let alice = cached(inner.clone(), store.clone()).with_components(["alice"]);
        let bob = cached(inner, store).with_components(["bob"]);
        let unbounded = EnumerateOptions::new();
        assert_ne!(alice.cache_key(&unbounded), bob.cache_key(&unbounded));
        assert_eq!(alice.cache_key(&unbounded).len(), 64);
    }

    #[test]
    fn key_depends_on_time_bounds() {
        let stream = cached(
            Arc::new(ListStream::numbered("posts", "p", 1)),
            Arc::new(MemoryCacheStore::new()),
        );
        let keys = [
            stream.cache_key(&EnumerateOptions::new()),
            stream.cache_key(&EnumerateOptions::new().with_before_ms(900)),
            stream.cache_key(&EnumerateOptions::new().with_after_ms(900)),
            stream.cache_key(&EnumerateOptions::new().with_before_ms(800)),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn bounded_call_does_not_reuse_unbounded_candidates() {
        let inner = Arc::new(ListStream::timeline("posts", 10, 1_000, 100));
        let store = Arc::new(MemoryCacheStore::new());
        let stream = cached(inner.clone(), store.clone());

        let open = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert_eq!(ids(&open), vec!["posts0", "posts1"]);

        let bounded_ctx =
            EnumerateContext::new().with_options(EnumerateOptions::new().with_before_ms(700));
        let bounded = stream.enumerate(2, None, &bounded_ctx).unwrap();
        assert_eq!(ids(&bounded), vec!["posts4", "posts5"]);
        assert!(bounded
            .elements()
            .iter()
            .all(|e| e.timestamp_ms().is_some_and(|ts| ts < 700)));

        assert_eq!(inner.call_count(), 2);
        assert_eq!(store.keys(CACHE_KIND).len(), 2);
    }

    #[test]
    fn cache_hit_matches_miss() {
        let inner = Arc::new(ListStream::numbered("posts", "p", 10));
        let store = Arc::new(MemoryCacheStore::new());
        let stream = cached(inner.clone(), store);
        let ctx = EnumerateContext::new();

        let miss = stream.enumerate(3, None, &ctx).unwrap();
        let hit = stream.enumerate(3, None, &ctx).unwrap();
        assert_eq!(inner.call_count(), 1);

        assert_eq!(ids(&miss), ids(&hit));
        for (a, b) in miss.elements().iter().zip(hit.elements()) {
            assert_eq!(a.provider_id(), b.provider_id());
            assert_eq!(a.cursor(), b.cursor());
        }
        assert_eq!(miss, hit);

        let next = hit.combined_cursor().unwrap();
        assert_eq!(next, Some(StreamCursor::Cached { offset: 3 }));
        let resumed = stream.enumerate(3, next.as_ref(), &ctx).unwrap();
        assert_eq!(ids(&resumed), vec!["p3"]);
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let inner = Arc::new(ListStream::numbered("posts", "p", 3));
        let store = Arc::new(MemoryCacheStore::new());
        let stream = cached(inner.clone(), store.clone());
        store.insert_raw(
            CACHE_KIND,
            &stream.cache_key(&EnumerateOptions::new()),
            "not json",
        );

        let page = stream.enumerate(2, None, &EnumerateContext::new()).unwrap();
        assert_eq!(ids(&page), vec!["p0", "p1"]);
        assert_eq!(inner.call_count(), 1);
    }

    #[test]
    fn rejects_foreign_cursor() {
        let stream = cached(
            Arc::new(ListStream::numbered("posts", "p", 3)),
            Arc::new(MemoryCacheStore::new()),
        );
        let err = stream
            .enumerate(2, Some(&StreamCursor::offset(1)), &EnumerateContext::new())
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
