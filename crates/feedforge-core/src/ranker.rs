//! The ranking contract.

use std::fmt::Debug;

use crate::element::StreamElement;
use crate::error::Result;
use crate::tracer::StreamTracer;

/// Reorders a batch of elements.
///
/// A ranker may fail; callers then keep the original order.
pub trait StreamRanker: Send + Sync + Debug {
    fn rank(
        &self,
        elements: &[StreamElement],
        tracer: Option<&dyn StreamTracer>,
    ) -> Result<Vec<StreamElement>>;
}

/// Ranks `elements`, falling back to their original order when the ranker fails.
pub fn rank_or_original(
    ranker: &dyn StreamRanker,
    elements: Vec<StreamElement>,
    tracer: Option<&dyn StreamTracer>,
) -> Vec<StreamElement> {
    match ranker.rank(&elements, tracer) {
        Ok(ranked) => ranked,
        Err(err) => {
            tracing::warn!(error = %err, "ranking failed, keeping original order");
            elements
        }
    }
}
