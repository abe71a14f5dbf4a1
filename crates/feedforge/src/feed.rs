//! Serving pages of a composed stream tree behind opaque cursor tokens.

use std::fmt;
use std::sync::Arc;

use feedforge_core::{
    decode_cursor, encode_cursor, CursorDecodeError, CursorEncodeError, EnumerateContext, Stream,
    StreamCursor, StreamElement, StreamError, StreamTracer,
};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced to callers of [`Feed::page`].
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("invalid cursor token: {0}")]
    Token(#[from] CursorDecodeError),

    /// The position after this page does not fit in a token.
    #[error("cannot issue cursor token: {0}")]
    Encode(#[from] CursorEncodeError),
}

/// One served page.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedPage {
    pub elements: Vec<StreamElement>,
    /// Token for the following page; `None` once the feed is exhausted.
    pub next_token: Option<String>,
    pub is_exhaustive: bool,
}

/// A root stream plus the collaborators threaded through every call.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use feedforge::{Feed, StaticStream};
/// use feedforge_core::{OriginalElement, StreamMeta};
///
/// let root = StaticStream::new(
///     StreamMeta::new("posts"),
///     (0..3).map(|i| OriginalElement::new("posts", i.to_string())).collect(),
/// );
/// let feed = Feed::new(Arc::new(root));
///
/// let first = feed.page(2, None).unwrap();
/// let second = feed.page(2, first.next_token.as_deref()).unwrap();
/// assert_eq!(second.elements.len(), 1);
/// assert!(second.next_token.is_none());
/// ```
pub struct Feed {
    root: Arc<dyn Stream>,
    tracer: Option<Arc<dyn StreamTracer>>,
}

impl Feed {
    pub fn new(root: Arc<dyn Stream>) -> Self {
        Self { root, tracer: None }
    }

    pub fn with_tracer(mut self, tracer: Arc<dyn StreamTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn root(&self) -> &Arc<dyn Stream> {
        &self.root
    }

    /// Serves up to `count` elements after `token`.
    ///
    /// A missing token starts from the top of the feed. The returned token
    /// folds this page's cursors onto the incoming position, so a page that
    /// returned nothing from some branch still carries that branch forward.
    pub fn page(&self, count: usize, token: Option<&str>) -> Result<FeedPage, FeedError> {
        let cursor = token.map(decode_cursor).transpose()?;

        let ctx = match self.tracer.as_deref() {
            Some(tracer) => EnumerateContext::new().with_tracer(tracer),
            None => EnumerateContext::new(),
        };
        let result = self.root.enumerate(count, cursor.as_ref(), &ctx)?;
        let is_exhaustive = result.is_exhaustive();

        let next = StreamCursor::combine(cursor.as_ref(), result.combined_cursor()?.as_ref())?;
        let next_token = match next {
            Some(next) if !is_exhaustive => Some(encode_cursor(&next)?),
            _ => None,
        };

        debug!(
            feed = self.root.identity(),
            returned = result.len(),
            is_exhaustive,
            "served page"
        );
        Ok(FeedPage {
            elements: result.into_elements(),
            next_token,
            is_exhaustive,
        })
    }
}

impl fmt::Debug for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed")
            .field("root", &self.root.identity())
            .field("traced", &self.tracer.is_some())
            .finish()
    }
}
