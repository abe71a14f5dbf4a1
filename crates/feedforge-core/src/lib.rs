//! FeedForge Core - Core types and traits for stream composition
//!
//! This crate provides the fundamental abstractions for FeedForge:
//! - Cursor algebra for resumable, combinable positions
//! - Elements with explicit provenance, and immutable result pages
//! - Filter state, weighted mixtures, multi-branch cursors, injection plans
//! - The [`Stream`] enumeration contract and collaborator traits
//!   (filters, rankers, injectors, cache stores, tracers)

pub mod cache;
pub mod codec;
pub mod cursor;
pub mod element;
pub mod error;
pub mod filter;
pub mod injection;
pub mod mixture;
pub mod multi_cursor;
pub mod ranker;
pub mod result;
pub mod stream;
pub mod tracer;

pub use cache::CacheStore;
pub use codec::{
    decode_cursor, encode_cursor, CursorDecodeError, CursorEncodeError, MAX_CURSOR_TOKEN_LEN,
};
pub use cursor::StreamCursor;
pub use element::{Derivation, OriginalElement, StreamElement};
pub use error::{Result, StreamError};
pub use filter::{StreamFilter, StreamFilterResult, StreamFilterState};
pub use injection::{
    InjectionAllocator, InjectionAllocatorResult, InjectionPlan, InjectorState, StreamInjection,
    StreamInjector,
};
pub use mixture::{ProportionalMixture, StreamWeight};
pub use multi_cursor::MultiCursor;
pub use ranker::{rank_or_original, StreamRanker};
pub use result::StreamResult;
pub use stream::{
    inappropriate_cursor, try_enumerate_branch, EnumerateContext, EnumerateOptions, Stream,
    StreamMeta,
};
pub use tracer::StreamTracer;
