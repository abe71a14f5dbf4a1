//! Weighted random selection between segments.

use std::sync::Arc;

use rand::Rng;

use crate::error::{Result, StreamError};
use crate::stream::Stream;

/// Ordered segments with cumulative, normalized weights.
///
/// Weights must be finite and strictly positive. An empty mixture is valid
/// and never draws anything.
///
/// # Example
///
/// ```
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
/// use feedforge_core::ProportionalMixture;
///
/// let mixture = ProportionalMixture::new(vec!["a", "b"], &[1.0, 3.0]).unwrap();
/// let mut rng = StdRng::seed_from_u64(7);
/// let drawn = mixture.draw(&mut rng).unwrap();
/// assert!(*drawn == "a" || *drawn == "b");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ProportionalMixture<K> {
    segments: Vec<K>,
    cumulative: Vec<f64>,
}

impl<K> ProportionalMixture<K> {
    /// Creates a mixture from segments and their raw weights.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidArgument`] when the lengths differ or a
    /// weight is not a positive finite number.
    pub fn new(segments: Vec<K>, weights: &[f64]) -> Result<Self> {
        if segments.len() != weights.len() {
            return Err(StreamError::InvalidArgument(format!(
                "mixture has {} segments but {} weights",
                segments.len(),
                weights.len()
            )));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(StreamError::InvalidArgument(format!(
                "mixture weight must be positive and finite, got {bad}"
            )));
        }

        let total: f64 = weights.iter().sum();
        let mut running = 0.0;
        let cumulative = weights
            .iter()
            .map(|w| {
                running += w / total;
                running
            })
            .collect();

        Ok(Self {
            segments,
            cumulative,
        })
    }

    pub fn segments(&self) -> &[K] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Normalized probability of the segment at `index`.
    pub fn probability(&self, index: usize) -> Option<f64> {
        let upper = *self.cumulative.get(index)?;
        let lower = index
            .checked_sub(1)
            .map_or(0.0, |prev| self.cumulative[prev]);
        Some(upper - lower)
    }

    /// Draws one segment.
    ///
    /// Picks the first segment whose cumulative weight exceeds a uniform draw
    /// in `[0, 1)`. The last segment absorbs floating-point rounding.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Option<&K> {
        if self.segments.is_empty() {
            return None;
        }
        let r: f64 = rng.random();
        let index = self
            .cumulative
            .iter()
            .position(|&bound| r < bound)
            .unwrap_or(self.segments.len() - 1);
        self.segments.get(index)
    }
}

/// A stream paired with its mixing weight.
#[derive(Clone, Debug)]
pub struct StreamWeight {
    stream: Arc<dyn Stream>,
    weight: f64,
}

impl StreamWeight {
    pub fn new(stream: Arc<dyn Stream>, weight: f64) -> Self {
        Self { stream, weight }
    }

    pub fn stream(&self) -> &Arc<dyn Stream> {
        &self.stream
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}
