//! Keyed per-branch cursors for multi-source operators.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cursor::StreamCursor;
use crate::element::StreamElement;
use crate::error::Result;
use crate::injection::InjectorState;
use crate::stream::Stream;

/// A bag of per-branch cursors plus an opaque injector state.
///
/// Branches are keyed by stream identity. Operators without distinct branch
/// identities may key by a synthetic index rendered as a string.
///
/// # Example
///
/// ```
/// use feedforge_core::{MultiCursor, OriginalElement, StreamCursor, StreamElement};
///
/// let element = StreamElement::new(OriginalElement::new("posts", "1"))
///     .derive("posts", Some(StreamCursor::offset(1)));
///
/// let cursor = MultiCursor::new().combine_from(&element).unwrap();
/// assert_eq!(cursor.cursor_for("posts"), Some(&StreamCursor::offset(1)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiCursor {
    #[serde(default)]
    cursors: BTreeMap<String, StreamCursor>,
    #[serde(default)]
    injector_state: Option<InjectorState>,
}

impl MultiCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cursor for one branch.
    pub fn with_cursor(mut self, branch: impl Into<String>, cursor: StreamCursor) -> Self {
        self.cursors.insert(branch.into(), cursor);
        self
    }

    /// Replaces the injector state.
    pub fn with_injector_state(mut self, state: Option<InjectorState>) -> Self {
        self.injector_state = state;
        self
    }

    pub fn cursors(&self) -> &BTreeMap<String, StreamCursor> {
        &self.cursors
    }

    pub fn cursor_for(&self, branch: &str) -> Option<&StreamCursor> {
        self.cursors.get(branch)
    }

    /// Looks up the cursor for a child stream by its identity.
    pub fn cursor_for_stream(&self, stream: &dyn Stream) -> Option<&StreamCursor> {
        self.cursor_for(stream.identity())
    }

    pub fn injector_state(&self) -> Option<&InjectorState> {
        self.injector_state.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty() && self.injector_state.is_none()
    }

    /// Returns a cursor whose branch for `element`'s producer has advanced past it.
    ///
    /// An element without a cursor leaves the branch unchanged.
    pub fn combine_from(&self, element: &StreamElement) -> Result<MultiCursor> {
        self.advance(element.producer(), element.cursor())
    }

    /// Returns a cursor whose `branch` entry is combined with `cursor`.
    pub fn advance(&self, branch: &str, cursor: Option<&StreamCursor>) -> Result<MultiCursor> {
        let combined = StreamCursor::combine(self.cursors.get(branch), cursor)?;
        let mut next = self.clone();
        if let Some(cursor) = combined {
            next.cursors.insert(branch.to_string(), cursor);
        }
        Ok(next)
    }

    /// Combines branch by branch; a branch present on one side only is kept as is.
    ///
    /// The injector state of `other` wins when both sides carry one.
    pub fn combine_with(&self, other: &MultiCursor) -> Result<MultiCursor> {
        let mut cursors = self.cursors.clone();
        for (branch, cursor) in &other.cursors {
            let combined = cursor.combine_with(cursors.get(branch))?;
            cursors.insert(branch.clone(), combined);
        }
        Ok(Self {
            cursors,
            injector_state: other
                .injector_state
                .clone()
                .or_else(|| self.injector_state.clone()),
        })
    }
}
