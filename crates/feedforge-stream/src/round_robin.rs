//! Main/minor interleaving with pluggable slot layouts.

use std::collections::{BTreeSet, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;

use feedforge_core::{
    inappropriate_cursor, try_enumerate_branch, EnumerateContext, MultiCursor, Result, Stream,
    StreamCursor, StreamElement, StreamError, StreamMeta, StreamResult,
};

/// Chooses which output positions of a page belong to the main stream.
pub trait RoundRobinPositions: Send + Sync + Debug {
    /// Main-stream positions within `0..count`.
    fn main_positions(&self, count: usize) -> BTreeSet<usize>;
}

/// Every position with `index % minor_modulus == minor_remainder` is a minor slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModulusPositions {
    minor_modulus: usize,
    minor_remainder: usize,
}

impl ModulusPositions {
    pub fn new(minor_modulus: usize, minor_remainder: usize) -> Result<Self> {
        if minor_modulus == 0 || minor_remainder >= minor_modulus {
            return Err(StreamError::InvalidConfig(format!(
                "minor remainder {minor_remainder} must be below modulus {minor_modulus}"
            )));
        }
        Ok(Self {
            minor_modulus,
            minor_remainder,
        })
    }
}

impl RoundRobinPositions for ModulusPositions {
    fn main_positions(&self, count: usize) -> BTreeSet<usize> {
        (0..count)
            .filter(|i| i % self.minor_modulus != self.minor_remainder)
            .collect()
    }
}

/// A fixed set of minor slots; every other position is main.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedMinorPositions {
    positions: BTreeSet<usize>,
}

impl FixedMinorPositions {
    pub fn new(positions: impl IntoIterator<Item = usize>) -> Self {
        Self {
            positions: positions.into_iter().collect(),
        }
    }
}

impl RoundRobinPositions for FixedMinorPositions {
    fn main_positions(&self, count: usize) -> BTreeSet<usize> {
        (0..count).filter(|i| !self.positions.contains(i)).collect()
    }
}

/// Interleaves one main stream with several minor streams.
///
/// Minor slots take elements round-robin across the minors. A minor slot
/// with no minor element left is filled from the main stream, and a main
/// slot with no main element left is filled from the minors.
///
/// Cursor kind: [`StreamCursor::Multi`], keyed by child identity.
#[derive(Debug)]
pub struct RoundRobinStreamMixer {
    meta: StreamMeta,
    main: Arc<dyn Stream>,
    minors: Vec<Arc<dyn Stream>>,
    positions: Arc<dyn RoundRobinPositions>,
}

impl RoundRobinStreamMixer {
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidConfig`] when two children share an identity.
    pub fn new(
        meta: StreamMeta,
        main: Arc<dyn Stream>,
        minors: Vec<Arc<dyn Stream>>,
        positions: Arc<dyn RoundRobinPositions>,
    ) -> Result<Self> {
        let mut identities = BTreeSet::from([main.identity()]);
        for minor in &minors {
            if !identities.insert(minor.identity()) {
                return Err(StreamError::InvalidConfig(format!(
                    "duplicate round-robin child {}",
                    minor.identity()
                )));
            }
        }
        Ok(Self {
            meta,
            main,
            minors,
            positions,
        })
    }
}

impl Stream for RoundRobinStreamMixer {
    fn meta(&self) -> &StreamMeta {
        &self.meta
    }

    fn is_enabled(&self) -> bool {
        !self.meta.is_skipped()
            && (self.main.is_enabled() || self.minors.iter().any(|m| m.is_enabled()))
    }

    fn enumerate_inner(
        &self,
        count: usize,
        cursor: Option<&StreamCursor>,
        ctx: &EnumerateContext<'_>,
    ) -> Result<StreamResult> {
        let multi = match cursor {
            None => MultiCursor::new(),
            Some(StreamCursor::Multi(multi)) => multi.clone(),
            Some(other) => return Err(inappropriate_cursor(self, other)),
        };

        let main_positions: BTreeSet<usize> = self
            .positions
            .main_positions(count)
            .into_iter()
            .filter(|&position| position < count)
            .collect();
        let minor_slots = count - main_positions.len();

        let main_page = try_enumerate_branch(
            self.main.as_ref(),
            count,
            multi.cursor_for_stream(self.main.as_ref()),
            ctx,
        )?;
        let main_exhaustive = main_page.is_exhaustive();
        let mut main: VecDeque<StreamElement> = main_page.into_elements().into();

        // A dry main stream leaves its slots to the minors.
        let minor_want = if main_exhaustive {
            minor_slots.max(count.saturating_sub(main.len()))
        } else {
            minor_slots
        };

        let mut minors_exhaustive = true;
        let mut minor_queues: Vec<(usize, VecDeque<StreamElement>)> = Vec::new();
        if minor_want > 0 {
            for (index, minor) in self.minors.iter().enumerate() {
                let page = try_enumerate_branch(
                    minor.as_ref(),
                    minor_want,
                    multi.cursor_for_stream(minor.as_ref()),
                    ctx,
                )?;
                minors_exhaustive &= page.is_exhaustive();
                minor_queues.push((index, page.into_elements().into()));
            }
        } else {
            minors_exhaustive = self.minors.is_empty();
        }
        let mut minor = round_robin(minor_queues);

        let mut running = multi;
        let mut elements = Vec::with_capacity(count);
        for position in 0..count {
            let (owner, element) = if main_positions.contains(&position) {
                match main.pop_front() {
                    Some(element) => (self.main.as_ref(), element),
                    None => match minor.pop_front() {
                        Some((index, element)) => (self.minors[index].as_ref(), element),
                        None => break,
                    },
                }
            } else {
                match minor.pop_front() {
                    Some((index, element)) => (self.minors[index].as_ref(), element),
                    None => match main.pop_front() {
                        Some(element) => (self.main.as_ref(), element),
                        None => break,
                    },
                }
            };
            running = running.advance(owner.identity(), element.cursor())?;
            elements.push(
                element.derive(self.identity(), Some(StreamCursor::Multi(running.clone()))),
            );
        }

        let is_exhaustive =
            main_exhaustive && main.is_empty() && minors_exhaustive && minor.is_empty();
        Ok(StreamResult::new(is_exhaustive, elements))
    }
}

/// Flattens per-minor queues by taking one element from each in turn.
fn round_robin(
    mut queues: Vec<(usize, VecDeque<StreamElement>)>,
) -> VecDeque<(usize, StreamElement)> {
    let mut merged = VecDeque::new();
    while queues.iter().any(|(_, queue)| !queue.is_empty()) {
        for (index, queue) in &mut queues {
            if let Some(element) = queue.pop_front() {
                merged.push_back((*index, element));
            }
        }
    }
    merged
}
