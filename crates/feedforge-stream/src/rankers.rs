//! Concrete rankers.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex};

use feedforge_core::{Result, StreamElement, StreamRanker, StreamTracer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

type Comparator = dyn Fn(&StreamElement, &StreamElement) -> Ordering + Send + Sync;

/// Stable sort by a comparator.
#[derive(Clone)]
pub struct SortingRanker {
    compare: Arc<Comparator>,
}

impl SortingRanker {
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&StreamElement, &StreamElement) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
        }
    }

    /// Ranks by a numeric attribute, highest first. Missing or unparsable
    /// values rank last.
    pub fn by_attribute_desc(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |a, b| {
            let score = |e: &StreamElement| {
                e.original()
                    .attribute(&key)
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or(f64::NEG_INFINITY)
            };
            score(b).total_cmp(&score(a))
        })
    }
}

impl fmt::Debug for SortingRanker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortingRanker").finish_non_exhaustive()
    }
}

impl StreamRanker for SortingRanker {
    fn rank(
        &self,
        elements: &[StreamElement],
        _tracer: Option<&dyn StreamTracer>,
    ) -> Result<Vec<StreamElement>> {
        let mut ranked = elements.to_vec();
        ranked.sort_by(|a, b| (self.compare)(a, b));
        Ok(ranked)
    }
}

/// Uniform random order from a seeded generator.
#[derive(Debug)]
pub struct ShufflingRanker {
    rng: Mutex<StdRng>,
}

impl ShufflingRanker {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for ShufflingRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRanker for ShufflingRanker {
    fn rank(
        &self,
        elements: &[StreamElement],
        _tracer: Option<&dyn StreamTracer>,
    ) -> Result<Vec<StreamElement>> {
        let mut ranked = elements.to_vec();
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ranked.shuffle(&mut *rng);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedforge_core::OriginalElement;

    fn scored(id: &str, score: &str) -> StreamElement {
        StreamElement::new(OriginalElement::new("p", id).with_attribute("score", score))
    }

    #[test]
    fn attribute_ranking_is_descending_with_missing_last() {
        let ranker = SortingRanker::by_attribute_desc("score");
        let elements = vec![
            scored("low", "1"),
            StreamElement::new(OriginalElement::new("p", "none")),
            scored("high", "9.5"),
        ];
        let ranked = ranker.rank(&elements, None).unwrap();
        let ids: Vec<_> = ranked.iter().map(|e| e.element_id()).collect();
        assert_eq!(ids, vec!["high", "low", "none"]);
    }

    #[test]
    fn seeded_shuffle_is_reproducible_permutation() {
        let elements: Vec<_> = (0..20).map(|i| scored(&i.to_string(), "0")).collect();
        let a = ShufflingRanker::with_seed(3).rank(&elements, None).unwrap();
        let b = ShufflingRanker::with_seed(3).rank(&elements, None).unwrap();
        assert_eq!(a, b);

        let mut keys: Vec<_> = a.iter().map(StreamElement::key).collect();
        keys.sort();
        let mut expected: Vec<_> = elements.iter().map(StreamElement::key).collect();
        expected.sort();
        assert_eq!(keys, expected);
    }
}
