//! Filter state, filter results, and the filter contract.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::element::StreamElement;
use crate::error::{Result, StreamError};
use crate::tracer::StreamTracer;

/// Per-operator filter memory carried between pages inside a cursor.
///
/// Merging is only defined between states of the same kind, and is
/// idempotent so that folding a page of element cursors never double counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamFilterState {
    /// Element keys already served. Merge is set union.
    SeenIds { ids: BTreeSet<String> },

    /// Elements served per provider. Merge is the pointwise maximum, so
    /// per-element states must be cumulative.
    ProviderCounts { counts: BTreeMap<String, usize> },
}

impl StreamFilterState {
    /// Creates a `SeenIds` state holding the given keys.
    pub fn seen_ids<I, K>(ids: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::SeenIds {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SeenIds { .. } => "seen_ids",
            Self::ProviderCounts { .. } => "provider_counts",
        }
    }

    pub fn can_merge_with(&self, other: &StreamFilterState) -> bool {
        self.kind() == other.kind()
    }

    /// Merges with another state of the same kind; merging with `None` is a no-op.
    pub fn merge_with(&self, other: Option<&StreamFilterState>) -> Result<StreamFilterState> {
        let Some(other) = other else {
            return Ok(self.clone());
        };
        match (self, other) {
            (Self::SeenIds { ids }, Self::SeenIds { ids: other_ids }) => Ok(Self::SeenIds {
                ids: ids.union(other_ids).cloned().collect(),
            }),
            (Self::ProviderCounts { counts }, Self::ProviderCounts { counts: other_counts }) => {
                let mut merged = counts.clone();
                for (provider, count) in other_counts {
                    let entry = merged.entry(provider.clone()).or_insert(0);
                    *entry = (*entry).max(*count);
                }
                Ok(Self::ProviderCounts { counts: merged })
            }
            _ => Err(StreamError::FilterStateMismatch {
                left: self.kind(),
                right: other.kind(),
            }),
        }
    }

    /// Merges two optional states, treating `None` as the identity.
    pub fn merge(
        left: Option<&StreamFilterState>,
        right: Option<&StreamFilterState>,
    ) -> Result<Option<StreamFilterState>> {
        match (left, right) {
            (Some(left), right) => left.merge_with(right).map(Some),
            (None, Some(right)) => Ok(Some(right.clone())),
            (None, None) => Ok(None),
        }
    }

    /// Folds a sequence of optional states, skipping absent entries.
    pub fn merge_all<'a, I>(states: I) -> Result<Option<StreamFilterState>>
    where
        I: IntoIterator<Item = Option<&'a StreamFilterState>>,
    {
        let mut merged: Option<StreamFilterState> = None;
        for state in states.into_iter().flatten() {
            merged = Self::merge(merged.as_ref(), Some(state))?;
        }
        Ok(merged)
    }
}

/// Partition of a batch into retained and released elements.
///
/// Stateful filters attach a state to each retained element, keyed by
/// [`StreamElement::key`].
#[derive(Clone, Debug, Default)]
pub struct StreamFilterResult {
    retained: Vec<StreamElement>,
    released: Vec<StreamElement>,
    states: BTreeMap<String, StreamFilterState>,
}

impl StreamFilterResult {
    pub fn new(retained: Vec<StreamElement>, released: Vec<StreamElement>) -> Self {
        Self {
            retained,
            released,
            states: BTreeMap::new(),
        }
    }

    /// Attaches the filter state produced for one retained element.
    pub fn with_state(mut self, element: &StreamElement, state: StreamFilterState) -> Self {
        self.states.insert(element.key(), state);
        self
    }

    pub fn retained(&self) -> &[StreamElement] {
        &self.retained
    }

    pub fn released(&self) -> &[StreamElement] {
        &self.released
    }

    pub fn state_for(&self, element: &StreamElement) -> Option<&StreamFilterState> {
        self.states.get(&element.key())
    }

    /// Merges the states of every retained element into one.
    pub fn merged_state(&self) -> Result<Option<StreamFilterState>> {
        StreamFilterState::merge_all(self.states.values().map(Some))
    }

    pub fn into_parts(
        self,
    ) -> (
        Vec<StreamElement>,
        Vec<StreamElement>,
        BTreeMap<String, StreamFilterState>,
    ) {
        (self.retained, self.released, self.states)
    }
}

/// Predicate-capable filter used by filtered streams.
pub trait StreamFilter: Send + Sync + Debug {
    /// Stable name used in logs and traces.
    fn identity(&self) -> &str;

    /// Partitions `elements`, given the state accumulated on previous pages.
    fn filter(
        &self,
        elements: Vec<StreamElement>,
        state: Option<&StreamFilterState>,
        tracer: Option<&dyn StreamTracer>,
    ) -> Result<StreamFilterResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, usize)]) -> StreamFilterState {
        StreamFilterState::ProviderCounts {
            counts: pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn seen_ids_merge_is_union() {
        let a = StreamFilterState::seen_ids(["a", "b"]);
        let b = StreamFilterState::seen_ids(["b", "c"]);
        assert_eq!(
            a.merge_with(Some(&b)).unwrap(),
            StreamFilterState::seen_ids(["a", "b", "c"])
        );
    }

    #[test]
    fn provider_counts_merge_is_pointwise_max() {
        let a = counts(&[("x", 2), ("y", 1)]);
        let b = counts(&[("x", 1), ("z", 4)]);
        assert_eq!(
            a.merge_with(Some(&b)).unwrap(),
            counts(&[("x", 2), ("y", 1), ("z", 4)])
        );
    }

    #[test]
    fn merging_with_absent_is_noop() {
        let a = StreamFilterState::seen_ids(["a"]);
        assert_eq!(a.merge_with(None).unwrap(), a);
        assert_eq!(
            StreamFilterState::merge(None, Some(&a)).unwrap(),
            Some(a.clone())
        );
    }

    #[test]
    fn mismatched_kinds_do_not_merge() {
        let err = StreamFilterState::seen_ids(["a"])
            .merge_with(Some(&counts(&[("x", 1)])))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn merge_all_skips_absent() {
        let a = StreamFilterState::seen_ids(["a"]);
        let b = StreamFilterState::seen_ids(["b"]);
        let merged = StreamFilterState::merge_all([None, Some(&a), None, Some(&b)]).unwrap();
        assert_eq!(merged, Some(StreamFilterState::seen_ids(["a", "b"])));
    }
}
