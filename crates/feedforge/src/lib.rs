//! FeedForge - Paginated Feed Composition in Rust
//!
//! Build a feed by composing stream operators into a tree, then serve it a
//! page at a time. Positions travel between pages as opaque tokens.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use feedforge::prelude::*;
//!
//! let posts = StaticStream::new(
//!     StreamMeta::new("posts"),
//!     (0..4).map(|i| OriginalElement::new("posts", format!("p{i}"))).collect(),
//! );
//! let pinned = StaticStream::new(
//!     StreamMeta::new("pinned"),
//!     vec![OriginalElement::new("editorial", "welcome")],
//! );
//! let root = PrependedStream::new(StreamMeta::new("home"), Arc::new(pinned), Arc::new(posts), 1);
//!
//! let feed = Feed::new(Arc::new(root));
//! let page = feed.page(3, None).unwrap();
//! assert_eq!(page.elements[0].element_id(), "welcome");
//! assert!(page.next_token.is_some());
//! ```

pub use feedforge_config as config;
pub use feedforge_core as core;

// Operators
pub use feedforge_stream::{
    BufferedRankedStream, CachedStream, ChronologicalBackfillStream, ChronologicalRangedStream,
    ChronologicalStreamMixer, ConcatenatedStream, CursorlessFilteredStream, EmptyStream,
    FilteredStream, InjectedStream, PrependedStream, ProportionalStreamCombiner,
    ProportionalStreamMixer, RankedStream, RoundRobinStreamMixer, SizeLimitedStream, StaticStream,
};

// Strategies and collaborators
pub use feedforge_stream::{
    DedupFilter, FixedMinorPositions, FixedPositionAllocator, LoggingTracer, ModulusAllocator,
    ModulusPositions, OffsetPagination, PredicateFilter, ProviderCapFilter, ShufflingRanker,
    SortingRanker, SourceInjector,
};

#[cfg(feature = "console")]
pub mod console;

mod feed;
pub use feed::{Feed, FeedError, FeedPage};

pub mod prelude {
    pub use super::{Feed, FeedError, FeedPage};
    pub use super::{
        ConcatenatedStream, FilteredStream, PrependedStream, SizeLimitedStream, StaticStream,
    };
    pub use feedforge_config::FeedConfig;
    pub use feedforge_core::{
        EnumerateContext, OriginalElement, Stream, StreamCursor, StreamElement, StreamError,
        StreamMeta, StreamResult,
    };
}
