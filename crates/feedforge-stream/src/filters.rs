//! Concrete filters for [`FilteredStream`](crate::FilteredStream).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use feedforge_core::{
    Result, StreamElement, StreamError, StreamFilter, StreamFilterResult, StreamFilterState,
    StreamTracer,
};

type Predicate = dyn Fn(&StreamElement) -> bool + Send + Sync;

/// Stateless filter retaining elements that satisfy a predicate.
#[derive(Clone)]
pub struct PredicateFilter {
    identity: String,
    predicate: Arc<Predicate>,
}

impl PredicateFilter {
    pub fn new<F>(identity: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&StreamElement) -> bool + Send + Sync + 'static,
    {
        Self {
            identity: identity.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for PredicateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateFilter")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl StreamFilter for PredicateFilter {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn filter(
        &self,
        elements: Vec<StreamElement>,
        _state: Option<&StreamFilterState>,
        _tracer: Option<&dyn StreamTracer>,
    ) -> Result<StreamFilterResult> {
        let (retained, released): (Vec<_>, Vec<_>) =
            elements.into_iter().partition(|e| (self.predicate)(e));
        Ok(StreamFilterResult::new(retained, released))
    }
}

/// Drops elements already served on an earlier page or earlier in the batch.
///
/// Keeps a [`StreamFilterState::SeenIds`] state. Each retained element
/// contributes its own key; union merging makes the carried state cumulative.
#[derive(Clone, Debug)]
pub struct DedupFilter {
    identity: String,
}

impl DedupFilter {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

impl StreamFilter for DedupFilter {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn filter(
        &self,
        elements: Vec<StreamElement>,
        state: Option<&StreamFilterState>,
        _tracer: Option<&dyn StreamTracer>,
    ) -> Result<StreamFilterResult> {
        let mut seen: BTreeSet<String> = match state {
            None => BTreeSet::new(),
            Some(StreamFilterState::SeenIds { ids }) => ids.clone(),
            Some(other) => {
                return Err(StreamError::FilterStateMismatch {
                    left: "seen_ids",
                    right: other.kind(),
                })
            }
        };

        let mut retained = Vec::new();
        let mut released = Vec::new();
        let mut states = Vec::new();
        for element in elements {
            let key = element.key();
            if seen.insert(key.clone()) {
                states.push(StreamFilterState::seen_ids([key]));
                retained.push(element);
            } else {
                released.push(element);
            }
        }

        let mut result = StreamFilterResult::new(retained.clone(), released);
        for (element, state) in retained.iter().zip(states) {
            result = result.with_state(element, state);
        }
        Ok(result)
    }
}

/// Caps how many elements any single provider may contribute across pages.
///
/// Keeps a [`StreamFilterState::ProviderCounts`] state. Per-element states are
/// cumulative snapshots, since provider counts merge by pointwise maximum.
#[derive(Clone, Debug)]
pub struct ProviderCapFilter {
    identity: String,
    cap: usize,
}

impl ProviderCapFilter {
    pub fn new(identity: impl Into<String>, cap: usize) -> Self {
        Self {
            identity: identity.into(),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl StreamFilter for ProviderCapFilter {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn filter(
        &self,
        elements: Vec<StreamElement>,
        state: Option<&StreamFilterState>,
        _tracer: Option<&dyn StreamTracer>,
    ) -> Result<StreamFilterResult> {
        let mut counts: BTreeMap<String, usize> = match state {
            None => BTreeMap::new(),
            Some(StreamFilterState::ProviderCounts { counts }) => counts.clone(),
            Some(other) => {
                return Err(StreamError::FilterStateMismatch {
                    left: "provider_counts",
                    right: other.kind(),
                })
            }
        };

        let mut retained = Vec::new();
        let mut released = Vec::new();
        let mut states = Vec::new();
        for element in elements {
            let served = counts.entry(element.provider_id().to_string()).or_insert(0);
            if *served < self.cap {
                *served += 1;
                states.push(StreamFilterState::ProviderCounts {
                    counts: counts.clone(),
                });
                retained.push(element);
            } else {
                released.push(element);
            }
        }

        let mut result = StreamFilterResult::new(retained.clone(), released);
        for (element, state) in retained.iter().zip(states) {
            result = result.with_state(element, state);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedforge_core::OriginalElement;

    fn element(provider: &str, id: &str) -> StreamElement {
        StreamElement::new(OriginalElement::new(provider, id))
    }

    #[test]
    fn predicate_partitions_batch() {
        let filter = PredicateFilter::new("no_b", |e| e.element_id() != "b");
        let result = filter
            .filter(vec![element("p", "a"), element("p", "b")], None, None)
            .unwrap();
        assert_eq!(result.retained().len(), 1);
        assert_eq!(result.released()[0].element_id(), "b");
        assert!(result.merged_state().unwrap().is_none());
    }

    #[test]
    fn dedup_respects_prior_state_and_batch() {
        let filter = DedupFilter::new("dedup");
        let prior = StreamFilterState::seen_ids(["p/a"]);
        let result = filter
            .filter(
                vec![element("p", "a"), element("p", "b"), element("p", "b")],
                Some(&prior),
                None,
            )
            .unwrap();

        assert_eq!(result.retained().len(), 1);
        assert_eq!(result.released().len(), 2);
        assert_eq!(
            result.merged_state().unwrap(),
            Some(StreamFilterState::seen_ids(["p/b"]))
        );
    }

    #[test]
    fn dedup_rejects_foreign_state() {
        let filter = DedupFilter::new("dedup");
        let foreign = StreamFilterState::ProviderCounts {
            counts: BTreeMap::new(),
        };
        let err = filter
            .filter(vec![element("p", "a")], Some(&foreign), None)
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn provider_cap_counts_cumulatively() {
        let filter = ProviderCapFilter::new("cap", 2);
        let prior = StreamFilterState::ProviderCounts {
            counts: BTreeMap::from([("x".to_string(), 1)]),
        };
        let result = filter
            .filter(
                vec![element("x", "1"), element("x", "2"), element("y", "3")],
                Some(&prior),
                None,
            )
            .unwrap();

        let ids: Vec<_> = result.retained().iter().map(|e| e.element_id()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        match result.merged_state().unwrap() {
            Some(StreamFilterState::ProviderCounts { counts }) => {
                assert_eq!(counts.get("x"), Some(&2));
                assert_eq!(counts.get("y"), Some(&1));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }
}
