//! Injection allocators and a stream-backed injector.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use feedforge_core::{
    EnumerateContext, InjectionAllocator, InjectionAllocatorResult, InjectionPlan, InjectorState,
    Result, Stream, StreamCursor, StreamElement, StreamError, StreamInjection, StreamInjector,
    StreamTracer,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Injects at the same page positions on every page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedPositionAllocator {
    positions: BTreeSet<usize>,
}

impl FixedPositionAllocator {
    pub fn new(positions: impl IntoIterator<Item = usize>) -> Self {
        Self {
            positions: positions.into_iter().collect(),
        }
    }
}

impl InjectionAllocator for FixedPositionAllocator {
    fn allocate(
        &self,
        count: usize,
        _state: Option<&InjectorState>,
    ) -> Result<InjectionAllocatorResult> {
        let positions = self.positions.range(..count).copied().collect();
        Ok(InjectionAllocatorResult::new(positions, None))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ModulusState {
    served: u64,
}

/// Injects at every slot whose feed-wide index is `remainder` modulo `modulus`.
///
/// The feed-wide slot count travels in the injector state, so the cadence
/// continues across page boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModulusAllocator {
    modulus: usize,
    remainder: usize,
}

impl ModulusAllocator {
    pub fn new(modulus: usize, remainder: usize) -> Result<Self> {
        if modulus == 0 || remainder >= modulus {
            return Err(StreamError::InvalidConfig(format!(
                "injection remainder {remainder} must be below modulus {modulus}"
            )));
        }
        Ok(Self { modulus, remainder })
    }
}

impl InjectionAllocator for ModulusAllocator {
    fn allocate(
        &self,
        count: usize,
        state: Option<&InjectorState>,
    ) -> Result<InjectionAllocatorResult> {
        let served = match state {
            Some(state) => state.decode::<ModulusState>()?.served,
            None => 0,
        };
        let modulus = self.modulus as u64;
        let remainder = self.remainder as u64;
        let positions = (0..count)
            .filter(|&i| (served + i as u64) % modulus == remainder)
            .collect();
        let next = InjectorState::encode(&ModulusState {
            served: served + count as u64,
        })?;
        Ok(InjectionAllocatorResult::new(positions, Some(next)))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SourceInjectorState {
    #[serde(default)]
    allocator: Option<InjectorState>,
    #[serde(default)]
    source: Option<StreamCursor>,
}

/// An injection whose element was fetched while planning.
#[derive(Debug)]
struct PrefetchedInjection(StreamElement);

impl StreamInjection for PrefetchedInjection {
    fn execute(
        &self,
        _position: usize,
        _tracer: Option<&dyn StreamTracer>,
    ) -> Result<Option<StreamElement>> {
        Ok(Some(self.0.clone()))
    }
}

/// Fills allocated slots from a source stream, paging through it across calls.
///
/// The allocator state and the source position are both kept in the
/// injector state. Slots beyond what the source can supply stay empty.
#[derive(Debug)]
pub struct SourceInjector {
    allocator: Arc<dyn InjectionAllocator>,
    source: Arc<dyn Stream>,
}

impl SourceInjector {
    pub fn new(allocator: Arc<dyn InjectionAllocator>, source: Arc<dyn Stream>) -> Self {
        Self { allocator, source }
    }
}

impl StreamInjector for SourceInjector {
    fn plan_injection(
        &self,
        count: usize,
        host: &str,
        state: Option<&InjectorState>,
        tracer: Option<&dyn StreamTracer>,
    ) -> Result<InjectionPlan> {
        let prior: SourceInjectorState = match state {
            Some(state) => state.decode()?,
            None => SourceInjectorState::default(),
        };

        let (positions, allocator_state) = self
            .allocator
            .allocate(count, prior.allocator.as_ref())?
            .into_parts();

        let mut source_cursor = prior.source;
        let mut injections: BTreeMap<usize, Box<dyn StreamInjection>> = BTreeMap::new();
        if !positions.is_empty() {
            let ctx = match tracer {
                Some(tracer) => EnumerateContext::new().with_tracer(tracer),
                None => EnumerateContext::new(),
            };
            let page = self
                .source
                .enumerate(positions.len(), source_cursor.as_ref(), &ctx)?;
            source_cursor =
                StreamCursor::combine(source_cursor.as_ref(), page.combined_cursor()?.as_ref())?;
            for (position, element) in positions.iter().zip(page.into_elements()) {
                injections.insert(*position, Box::new(PrefetchedInjection(element)));
            }
        }
        debug!(host, planned = injections.len(), "planned injections");

        let next = InjectorState::encode(&SourceInjectorState {
            allocator: allocator_state,
            source: source_cursor,
        })?;
        Ok(InjectionPlan::new(injections, Some(next)))
    }
}
