//! Stream cursors and their combination algebra.
//!
//! A cursor is an opaque position token for one operator. Every element an
//! operator returns carries the cursor that resumes *past* that element, and a
//! whole page folds into a single summary position via [`StreamCursor::combine_all`].
//!
//! Cursor kinds form a closed set. Combination is only defined between cursors
//! of the same kind; absence is the identity element.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::element::StreamElement;
use crate::error::{Result, StreamError};
use crate::filter::StreamFilterState;
use crate::multi_cursor::MultiCursor;

/// Opaque, combinable position token.
///
/// # Example
///
/// ```
/// use feedforge_core::StreamCursor;
///
/// let a = StreamCursor::offset(3);
/// let b = StreamCursor::offset(7);
/// assert_eq!(a.combine_with(Some(&b)).unwrap(), StreamCursor::offset(7));
/// assert_eq!(a.combine_with(None).unwrap(), a);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamCursor {
    /// Position in an indexed source. Combining keeps the furthest offset.
    Offset { offset: u64 },

    /// Position in a newest-first timeline. Combining keeps the oldest timestamp.
    Timestamp { timestamp_ms: i64 },

    /// Inner position plus accumulated filter memory.
    Filtered {
        inner: Option<Box<StreamCursor>>,
        state: Option<StreamFilterState>,
    },

    /// Index of the source currently being drained plus its position.
    ///
    /// `before_ms` is the time bound a stateful concatenation has carried
    /// over from earlier sources. It applies to every later source.
    Concatenated {
        source: usize,
        inner: Option<Box<StreamCursor>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        before_ms: Option<i64>,
    },

    /// Position in the `after` branch. Any prepended cursor marks the first page as served.
    Prepended { after: Option<Box<StreamCursor>> },

    /// Inner position plus the number of elements served so far.
    SizeLimited {
        inner: Option<Box<StreamCursor>>,
        size: usize,
    },

    /// Elements fetched but not yet emitted, plus the inner position after them.
    Buffered {
        buffer: Vec<StreamElement>,
        inner: Option<Box<StreamCursor>>,
    },

    /// Per-branch positions for multi-source operators.
    Multi(MultiCursor),

    /// Offset into a cached candidate page.
    Cached { offset: usize },
}

impl StreamCursor {
    /// Creates an offset cursor.
    pub fn offset(offset: u64) -> Self {
        Self::Offset { offset }
    }

    /// Creates a timestamp cursor.
    pub fn timestamp(timestamp_ms: i64) -> Self {
        Self::Timestamp { timestamp_ms }
    }

    /// The position of an offset cursor.
    pub fn as_offset(&self) -> Option<u64> {
        match self {
            Self::Offset { offset } => Some(*offset),
            _ => None,
        }
    }

    /// The position of a timestamp cursor.
    pub fn timestamp_ms(&self) -> Option<i64> {
        match self {
            Self::Timestamp { timestamp_ms } => Some(*timestamp_ms),
            _ => None,
        }
    }

    /// Returns the stable name of this cursor's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Offset { .. } => "offset",
            Self::Timestamp { .. } => "timestamp",
            Self::Filtered { .. } => "filtered",
            Self::Concatenated { .. } => "concatenated",
            Self::Prepended { .. } => "prepended",
            Self::SizeLimited { .. } => "size_limited",
            Self::Buffered { .. } => "buffered",
            Self::Multi(_) => "multi",
            Self::Cached { .. } => "cached",
        }
    }

    /// Returns true if `other` was produced by the same kind of operator.
    pub fn can_combine_with(&self, other: &StreamCursor) -> bool {
        self.kind() == other.kind()
    }

    /// Combines this cursor with another position of the same kind.
    ///
    /// Combining with `None` returns `self` unchanged, and combining a cursor
    /// with itself is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::CursorTypeMismatch`] when the kinds differ.
    pub fn combine_with(&self, other: Option<&StreamCursor>) -> Result<StreamCursor> {
        let Some(other) = other else {
            return Ok(self.clone());
        };

        let combined = match (self, other) {
            (Self::Offset { offset: a }, Self::Offset { offset: b }) => Self::offset(*a.max(b)),
            (Self::Timestamp { timestamp_ms: a }, Self::Timestamp { timestamp_ms: b }) => {
                Self::timestamp(*a.min(b))
            }
            (
                Self::Filtered { inner, state },
                Self::Filtered {
                    inner: other_inner,
                    state: other_state,
                },
            ) => Self::Filtered {
                inner: combine_boxed(inner, other_inner)?,
                state: StreamFilterState::merge(state.as_ref(), other_state.as_ref())?,
            },
            (
                Self::Concatenated {
                    source,
                    inner,
                    before_ms,
                },
                Self::Concatenated {
                    source: other_source,
                    inner: other_inner,
                    before_ms: other_before_ms,
                },
            ) => match source.cmp(other_source) {
                std::cmp::Ordering::Greater => self.clone(),
                std::cmp::Ordering::Less => other.clone(),
                std::cmp::Ordering::Equal => Self::Concatenated {
                    source: *source,
                    inner: combine_boxed(inner, other_inner)?,
                    before_ms: tighter_bound(*before_ms, *other_before_ms),
                },
            },
            (Self::Prepended { after }, Self::Prepended { after: other_after }) => {
                Self::Prepended {
                    after: combine_boxed(after, other_after)?,
                }
            }
            (
                Self::SizeLimited { inner, size },
                Self::SizeLimited {
                    inner: other_inner,
                    size: other_size,
                },
            ) => Self::SizeLimited {
                inner: combine_boxed(inner, other_inner)?,
                size: *size.max(other_size),
            },
            (
                Self::Buffered { buffer, inner },
                Self::Buffered {
                    buffer: other_buffer,
                    inner: other_inner,
                },
            ) => {
                let combined_inner = combine_boxed(inner, other_inner)?;
                let self_ahead = *inner == combined_inner;
                let other_ahead = *other_inner == combined_inner;
                match (self_ahead, other_ahead) {
                    // The position that fetched further owns a buffer refilled
                    // after the other one was taken.
                    (true, false) => self.clone(),
                    (false, true) => other.clone(),
                    _ => {
                        // Same fetch: an element is still pending only if
                        // neither position emitted it.
                        let pending: HashSet<String> =
                            other_buffer.iter().map(StreamElement::key).collect();
                        Self::Buffered {
                            buffer: buffer
                                .iter()
                                .filter(|element| pending.contains(&element.key()))
                                .cloned()
                                .collect(),
                            inner: combined_inner,
                        }
                    }
                }
            }
            (Self::Multi(a), Self::Multi(b)) => Self::Multi(a.combine_with(b)?),
            (Self::Cached { offset: a }, Self::Cached { offset: b }) => Self::Cached {
                offset: *a.max(b),
            },
            _ => {
                return Err(StreamError::CursorTypeMismatch {
                    left: self.kind(),
                    right: other.kind(),
                })
            }
        };
        Ok(combined)
    }

    /// Combines two optional cursors, treating `None` as the identity.
    pub fn combine(
        left: Option<&StreamCursor>,
        right: Option<&StreamCursor>,
    ) -> Result<Option<StreamCursor>> {
        match (left, right) {
            (Some(left), right) => left.combine_with(right).map(Some),
            (None, Some(right)) => Ok(Some(right.clone())),
            (None, None) => Ok(None),
        }
    }

    /// Folds a sequence of optional cursors into one, skipping absent entries.
    pub fn combine_all<'a, I>(cursors: I) -> Result<Option<StreamCursor>>
    where
        I: IntoIterator<Item = Option<&'a StreamCursor>>,
    {
        let mut combined: Option<StreamCursor> = None;
        for cursor in cursors.into_iter().flatten() {
            combined = Some(match combined {
                Some(current) => current.combine_with(Some(cursor))?,
                None => cursor.clone(),
            });
        }
        Ok(combined)
    }
}

fn tighter_bound(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn combine_boxed(
    left: &Option<Box<StreamCursor>>,
    right: &Option<Box<StreamCursor>>,
) -> Result<Option<Box<StreamCursor>>> {
    Ok(StreamCursor::combine(left.as_deref(), right.as_deref())?.map(Box::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::OriginalElement;

    fn element(id: &str) -> StreamElement {
        StreamElement::new(OriginalElement::new("test", id))
    }

    #[test]
    fn absent_is_identity_on_both_sides() {
        let cursor = StreamCursor::offset(4);
        assert_eq!(cursor.combine_with(None).unwrap(), cursor);
        assert_eq!(
            StreamCursor::combine(None, Some(&cursor)).unwrap(),
            Some(cursor.clone())
        );
        assert_eq!(StreamCursor::combine(None, None).unwrap(), None);
    }

    #[test]
    fn combining_with_itself_is_idempotent() {
        let cursors = [
            StreamCursor::offset(2),
            StreamCursor::timestamp(1_000),
            StreamCursor::Concatenated {
                source: 1,
                inner: Some(Box::new(StreamCursor::offset(5))),
                before_ms: Some(700),
            },
            StreamCursor::SizeLimited {
                inner: None,
                size: 3,
            },
            StreamCursor::Cached { offset: 9 },
        ];
        for cursor in cursors {
            assert_eq!(cursor.combine_with(Some(&cursor)).unwrap(), cursor);
        }
    }

    #[test]
    fn different_kinds_do_not_combine() {
        let err = StreamCursor::offset(1)
            .combine_with(Some(&StreamCursor::timestamp(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            StreamError::CursorTypeMismatch {
                left: "offset",
                right: "timestamp"
            }
        ));
        assert!(err.is_fatal());
    }

    #[test]
    fn timestamp_keeps_oldest_position() {
        let newer = StreamCursor::timestamp(2_000);
        let older = StreamCursor::timestamp(1_000);
        assert_eq!(newer.combine_with(Some(&older)).unwrap(), older);
    }

    #[test]
    fn concatenated_prefers_later_source() {
        let first = StreamCursor::Concatenated {
            source: 0,
            inner: Some(Box::new(StreamCursor::offset(10))),
            before_ms: None,
        };
        let second = StreamCursor::Concatenated {
            source: 1,
            inner: Some(Box::new(StreamCursor::offset(1))),
            before_ms: Some(900),
        };
        assert_eq!(first.combine_with(Some(&second)).unwrap(), second);
        assert_eq!(second.combine_with(Some(&first)).unwrap(), second);
    }

    #[test]
    fn concatenated_keeps_tighter_time_bound() {
        let bounded = |before_ms| StreamCursor::Concatenated {
            source: 1,
            inner: Some(Box::new(StreamCursor::offset(2))),
            before_ms,
        };
        assert_eq!(
            bounded(Some(900)).combine_with(Some(&bounded(Some(500)))).unwrap(),
            bounded(Some(500))
        );
        assert_eq!(
            bounded(None).combine_with(Some(&bounded(Some(900)))).unwrap(),
            bounded(Some(900))
        );
        assert_eq!(
            bounded(Some(900)).combine_with(Some(&bounded(None))).unwrap(),
            bounded(Some(900))
        );
    }

    #[test]
    fn size_limited_keeps_largest_size() {
        let a = StreamCursor::SizeLimited {
            inner: Some(Box::new(StreamCursor::offset(1))),
            size: 1,
        };
        let b = StreamCursor::SizeLimited {
            inner: Some(Box::new(StreamCursor::offset(2))),
            size: 2,
        };
        assert_eq!(a.combine_with(Some(&b)).unwrap(), b);
    }

    #[test]
    fn buffered_keeps_elements_pending_in_both() {
        let a = StreamCursor::Buffered {
            buffer: vec![element("b"), element("c")],
            inner: Some(Box::new(StreamCursor::offset(4))),
        };
        let b = StreamCursor::Buffered {
            buffer: vec![element("c")],
            inner: Some(Box::new(StreamCursor::offset(4))),
        };
        match a.combine_with(Some(&b)).unwrap() {
            StreamCursor::Buffered { buffer, inner } => {
                assert_eq!(buffer.len(), 1);
                assert_eq!(buffer[0].element_id(), "c");
                assert_eq!(inner.as_deref(), Some(&StreamCursor::offset(4)));
            }
            other => panic!("unexpected cursor {other:?}"),
        }
    }

    #[test]
    fn buffered_position_that_fetched_further_wins() {
        let taken_earlier = StreamCursor::Buffered {
            buffer: vec![element("n2")],
            inner: Some(Box::new(StreamCursor::offset(3))),
        };
        let refilled = StreamCursor::Buffered {
            buffer: vec![element("n4")],
            inner: Some(Box::new(StreamCursor::offset(5))),
        };
        assert_eq!(
            taken_earlier.combine_with(Some(&refilled)).unwrap(),
            refilled
        );
        assert_eq!(
            refilled.combine_with(Some(&taken_earlier)).unwrap(),
            refilled
        );

        let drained_earlier = StreamCursor::Buffered {
            buffer: Vec::new(),
            inner: Some(Box::new(StreamCursor::offset(3))),
        };
        assert_eq!(
            drained_earlier.combine_with(Some(&refilled)).unwrap(),
            refilled
        );
    }

    #[test]
    fn combine_all_skips_absent_entries() {
        let a = StreamCursor::offset(1);
        let b = StreamCursor::offset(6);
        let combined = StreamCursor::combine_all([Some(&a), None, Some(&b), None]).unwrap();
        assert_eq!(combined, Some(b));
        assert_eq!(StreamCursor::combine_all([None, None]).unwrap(), None);
    }
}
