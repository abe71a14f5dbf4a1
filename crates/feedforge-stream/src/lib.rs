//! Stream composition operators for FeedForge.
//!
//! Every operator here implements [`feedforge_core::Stream`] and wraps one or
//! more child streams held as `Arc<dyn Stream>`, so trees of any shape can be
//! assembled at runtime:
//! - Filtering with bounded retry (`FilteredStream`, `CursorlessFilteredStream`)
//! - Sequencing (`ConcatenatedStream`, `PrependedStream`, `SizeLimitedStream`)
//! - Time-ordered merging (`ChronologicalStreamMixer` and friends)
//! - Weighted and slot-based mixing (`ProportionalStreamCombiner`, `RoundRobinStreamMixer`)
//! - Re-ranking, injection and read-through caching
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use feedforge_core::{EnumerateContext, OriginalElement, Stream, StreamMeta};
//! use feedforge_stream::{DedupFilter, FilteredStream, SizeLimitedStream, StaticStream};
//!
//! let source = StaticStream::new(
//!     StreamMeta::new("posts"),
//!     ["a", "a", "b", "c"]
//!         .iter()
//!         .map(|id| OriginalElement::new("posts", *id))
//!         .collect(),
//! );
//! let unique = FilteredStream::new(
//!     StreamMeta::new("unique"),
//!     Arc::new(source),
//!     Arc::new(DedupFilter::new("dedup")),
//! );
//! let feed = SizeLimitedStream::new(StreamMeta::new("feed"), Arc::new(unique), 2);
//!
//! let page = feed.enumerate(5, None, &EnumerateContext::new()).unwrap();
//! assert_eq!(page.len(), 2);
//! ```

pub mod cached;
pub mod chronological;
pub mod concatenated;
pub mod filtered;
pub mod filters;
pub mod injected;
pub mod injector;
pub mod leaf;
pub mod prepended;
pub mod proportional;
pub mod ranked;
pub mod rankers;
pub mod round_robin;
pub mod size_limited;
pub mod tracer;

// ============================================================================
// Leaves
// ============================================================================

pub use leaf::{EmptyStream, StaticStream};

// ============================================================================
// Filtering
// ============================================================================

pub use filtered::{CursorlessFilteredStream, FilteredStream};
pub use filters::{DedupFilter, PredicateFilter, ProviderCapFilter};

// ============================================================================
// Sequencing
// ============================================================================

pub use concatenated::ConcatenatedStream;
pub use prepended::PrependedStream;
pub use size_limited::SizeLimitedStream;

// ============================================================================
// Mixing
// ============================================================================

pub use chronological::{
    ChronologicalBackfillStream, ChronologicalRangedStream, ChronologicalStreamMixer,
    PrefetchHook,
};
pub use proportional::{ProportionalStreamCombiner, ProportionalStreamMixer, WeightProvider};
pub use round_robin::{
    FixedMinorPositions, ModulusPositions, RoundRobinPositions, RoundRobinStreamMixer,
};

// ============================================================================
// Ranking, injection, caching
// ============================================================================

pub use cached::{CachePagination, CachedStream, OffsetPagination};
pub use injected::InjectedStream;
pub use injector::{FixedPositionAllocator, ModulusAllocator, SourceInjector};
pub use ranked::{BufferedRankedStream, RankedStream};
pub use rankers::{ShufflingRanker, SortingRanker};
pub use tracer::LoggingTracer;
