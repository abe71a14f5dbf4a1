//! Weighted random interleaving of several streams.

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use feedforge_config::MixerConfig;
use feedforge_core::{
    inappropriate_cursor, try_enumerate_branch, EnumerateContext, MultiCursor,
    ProportionalMixture, Result, Stream, StreamCursor, StreamElement, StreamError, StreamMeta,
    StreamResult, StreamTracer, StreamWeight,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

/// Supplies mixing weights per call, one per branch in declared order.
pub trait WeightProvider: Send + Sync + Debug {
    fn weights(&self, branches: &[&str], tracer: Option<&dyn StreamTracer>) -> Result<Vec<f64>>;
}

fn validate_branches(branches: &[StreamWeight]) -> Result<()> {
    let mut identities = BTreeSet::new();
    for branch in branches {
        let weight = branch.weight();
        if !weight.is_finite() || weight <= 0.0 {
            return Err(StreamError::InvalidConfig(format!(
                "branch {} has weight {weight}, weights must be positive",
                branch.stream().identity()
            )));
        }
        if !identities.insert(branch.stream().identity()) {
            return Err(StreamError::InvalidConfig(format!(
                "duplicate branch identity {}",
                branch.stream().identity()
            )));
        }
    }
    Ok(())
}

fn seeded_rng(seed: Option<u64>) -> Mutex<StdRng> {
    Mutex::new(match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    })
}

/// Per-branch bookkeeping for one call.
struct Branch<'a> {
    stream: &'a dyn Stream,
    weight: f64,
    pending: VecDeque<StreamElement>,
    fetch_cursor: Option<StreamCursor>,
    exhausted: bool,
}

impl Branch<'_> {
    fn is_eligible(&self) -> bool {
        !self.pending.is_empty() || !self.exhausted
    }
}

/// Draws branches by weight, refilling each from its stream on demand.
fn interleave(
    host: &dyn Stream,
    streams: &[&dyn Stream],
    weights: &[f64],
    rng: &Mutex<StdRng>,
    count: usize,
    cursor: Option<&StreamCursor>,
    ctx: &EnumerateContext<'_>,
) -> Result<StreamResult> {
    let multi = match cursor {
        None => MultiCursor::new(),
        Some(StreamCursor::Multi(multi)) => multi.clone(),
        Some(other) => return Err(inappropriate_cursor(host, other)),
    };

    let mut branches: Vec<Branch<'_>> = streams
        .iter()
        .zip(weights)
        .map(|(stream, weight)| Branch {
            stream: *stream,
            weight: *weight,
            pending: VecDeque::new(),
            fetch_cursor: multi.cursor_for_stream(*stream).cloned(),
            exhausted: !stream.is_enabled(),
        })
        .collect();

    let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut running = multi;
    let mut elements = Vec::with_capacity(count);

    while elements.len() < count {
        let eligible: Vec<usize> = (0..branches.len())
            .filter(|&i| branches[i].is_eligible())
            .collect();
        let eligible_weights: Vec<f64> = eligible.iter().map(|&i| branches[i].weight).collect();
        let mixture = ProportionalMixture::new(eligible, &eligible_weights)?;
        let Some(&drawn) = mixture.draw(&mut *rng) else {
            break;
        };

        let branch = &mut branches[drawn];
        if branch.pending.is_empty() {
            let remaining = count - elements.len();
            let page =
                try_enumerate_branch(branch.stream, remaining, branch.fetch_cursor.as_ref(), ctx)?;
            branch.exhausted = page.is_exhaustive();
            branch.fetch_cursor = StreamCursor::combine(
                branch.fetch_cursor.as_ref(),
                page.combined_cursor()?.as_ref(),
            )?;
            branch.pending.extend(page.into_elements());
            debug!(
                stream = host.identity(),
                branch = branch.stream.identity(),
                fetched = branch.pending.len(),
                "refilled branch"
            );
        }

        if let Some(element) = branch.pending.pop_front() {
            running = running.advance(branch.stream.identity(), element.cursor())?;
            elements.push(
                element.derive(host.identity(), Some(StreamCursor::Multi(running.clone()))),
            );
        }
    }

    let is_exhaustive = !branches.iter().any(Branch::is_eligible);
    Ok(StreamResult::new(is_exhaustive, elements))
}

/// Interleaves branches at random, in proportion to static weights.
///
/// Cursor kind: [`StreamCursor::Multi`], one entry per branch identity.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use feedforge_core::{EnumerateContext, OriginalElement, Stream, StreamMeta, StreamWeight};
/// use feedforge_stream::{ProportionalStreamCombiner, StaticStream};
///
/// let posts = StaticStream::new(
///     StreamMeta::new("posts"),
///     (0..5).map(|i| OriginalElement::new("posts", i.to_string())).collect(),
/// );
/// let ads = StaticStream::new(
///     StreamMeta::new("ads"),
///     (0..5).map(|i| OriginalElement::new("ads", i.to_string())).collect(),
/// );
/// let combiner = ProportionalStreamCombiner::new(
///     StreamMeta::new("mixed"),
///     vec![
///         StreamWeight::new(Arc::new(posts), 3.0),
///         StreamWeight::new(Arc::new(ads), 1.0),
///     ],
/// )
/// .unwrap()
/// .with_seed(7);
///
/// let page = combiner.enumerate(10, None, &EnumerateContext::new()).unwrap();
/// assert_eq!(page.len(), 10);
/// assert!(page.is_exhaustive());
/// ```
#[derive(Debug)]
pub struct ProportionalStreamCombiner {
    meta: StreamMeta,
    branches: Vec<StreamWeight>,
    rng: Mutex<StdRng>,
}

impl ProportionalStreamCombiner {
    /// Creates a combiner over weighted branches.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] for a non-positive weight or a
    /// repeated branch identity.
    pub fn new(meta: StreamMeta, branches: Vec<StreamWeight>) -> Result<Self> {
        validate_branches(&branches)?;
        Ok(Self {
            meta,
            branches,
            rng: seeded_rng(None),
        })
    }

    /// Reseeds from configuration when it carries a seed.
    pub fn with_config(self, config: &MixerConfig) -> Self {
        match config.random_seed {
            Some(seed) => self.with_seed(seed),
            None => self,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = seeded_rng(Some(seed));
        self
    }

    pub fn branches(&self) -> &[StreamWeight] {
        &self.branches
    }
}

impl Stream for ProportionalStreamCombiner {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn is_enabled(&self) -> bool {
        !self.meta.is_skipped() && self.branches.iter().any(|b| b.stream().is_enabled())
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let streams: Vec<&dyn Stream> =
            self.branches.iter().map(|b| b.stream().as_ref()).collect();
        let weights: Vec<f64> = self.branches.iter().map(StreamWeight::weight).collect();
        interleave(self, &streams, &weights, &self.rng, count, cursor, ctx)
    }
}

/// Proportional interleaving with weights resolved on every call.
///
/// The static branch weights are the fallback whenever the provider fails or
/// returns unusable weights.
#[derive(Debug)]
pub struct ProportionalStreamMixer {
    meta: StreamMeta,
    branches: Vec<StreamWeight>,
    provider: Arc<dyn WeightProvider>,
    rng: Mutex<StdRng>,
}

impl ProportionalStreamMixer {
    pub fn new(
        meta: StreamMeta,
        branches: Vec<StreamWeight>,
        provider: Arc<dyn WeightProvider>,
    ) -> Result<Self> {
        validate_branches(&branches)?;
        Ok(Self {
            meta,
            branches,
            provider,
            rng: seeded_rng(None),
        })
    }

    pub fn with_config(self, config: &MixerConfig) -> Self {
        match config.random_seed {
            Some(seed) => self.with_seed(seed),
            None => self,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = seeded_rng(Some(seed));
        self
    }

    fn resolve_weights(&self, tracer: Option<&dyn StreamTracer>) -> Vec<f64> {
        let fallback = || -> Vec<f64> { self.branches.iter().map(StreamWeight::weight).collect() };
        let identities: Vec<&str> =
            self.branches.iter().map(|b| b.stream().identity()).collect();
        match self.provider.weights(&identities, tracer) {
            Ok(weights)
                if weights.len() == self.branches.len()
                    && weights.iter().all(|w| w.is_finite() && *w > 0.0) =>
            {
                weights
            }
            Ok(weights) => {
                warn!(
                    stream = self.identity(),
                    ?weights,
                    "weight provider returned unusable weights, using fallback"
                );
                fallback()
            }
            Err(err) => {
                warn!(
                    stream = self.identity(),
                    error = %err,
                    "weight provider failed, using fallback"
                );
                fallback()
            }
        }
    }
}

impl Stream for ProportionalStreamMixer {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn is_enabled(&self) -> bool {
        !self.meta.is_skipped() && self.branches.iter().any(|b| b.stream().is_enabled())
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let weights = self.resolve_weights(ctx.tracer());
        let streams: Vec<&dyn Stream> =
            self.branches.iter().map(|b| b.stream().as_ref()).collect();
        interleave(self, &streams, &weights, &self.rng, count, cursor, ctx)
    }
}

#[cfg(test)]
#[path = "proportional_tests.rs"]
mod tests;
