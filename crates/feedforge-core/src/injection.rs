//! Injection plans: deferred elements spliced into a finished page.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::element::StreamElement;
use crate::error::Result;
use crate::result::StreamResult;
use crate::tracer::StreamTracer;

/// Opaque injector memory carried between pages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InjectorState(serde_json::Value);

impl InjectorState {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Encodes any serializable injector memory.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::to_value(value)?))
    }

    /// Decodes the memory back into the injector's own type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.0.clone())?)
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// A deferred, possibly failing, single-element producer.
pub trait StreamInjection: Send + Sync + Debug {
    /// Materializes the element for output `position`, or nothing.
    fn execute(
        &self,
        position: usize,
        tracer: Option<&dyn StreamTracer>,
    ) -> Result<Option<StreamElement>>;
}

/// Sparse map of output position to injection, plus the next injector state.
///
/// # Example
///
/// ```
/// use feedforge_core::{InjectionPlan, StreamResult};
///
/// let plan = InjectionPlan::empty();
/// assert!(plan.is_empty());
/// assert!(plan.apply_to(StreamResult::empty(), None).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InjectionPlan {
    injections: BTreeMap<usize, Box<dyn StreamInjection>>,
    injector_state: Option<InjectorState>,
}

impl InjectionPlan {
    pub fn new(
        injections: BTreeMap<usize, Box<dyn StreamInjection>>,
        injector_state: Option<InjectorState>,
    ) -> Self {
        Self {
            injections,
            injector_state,
        }
    }

    /// The plan that injects nothing and keeps no state.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_injection(mut self, position: usize, injection: Box<dyn StreamInjection>) -> Self {
        self.injections.insert(position, injection);
        self
    }

    pub fn with_injector_state(mut self, state: InjectorState) -> Self {
        self.injector_state = Some(state);
        self
    }

    pub fn len(&self) -> usize {
        self.injections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.injections.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.injections.keys().copied()
    }

    pub fn injector_state(&self) -> Option<&InjectorState> {
        self.injector_state.as_ref()
    }

    /// Splices every materialized injection into `result`.
    pub fn apply_to(&self, result: StreamResult, tracer: Option<&dyn StreamTracer>) -> StreamResult {
        self.apply_with(result, tracer, |element| element)
    }

    /// Splices injections in ascending position order, passing each one through `derive`.
    ///
    /// Each insertion lands at its target position, clamped to the current
    /// length, so later elements shift right. An injection that yields nothing
    /// or fails is skipped without leaving a gap.
    pub fn apply_with<F>(
        &self,
        result: StreamResult,
        tracer: Option<&dyn StreamTracer>,
        mut derive: F,
    ) -> StreamResult
    where
        F: FnMut(StreamElement) -> StreamElement,
    {
        let is_exhaustive = result.is_exhaustive();
        let mut elements = result.into_elements();
        for (&position, injection) in &self.injections {
            match injection.execute(position, tracer) {
                Ok(Some(element)) => {
                    let at = position.min(elements.len());
                    elements.insert(at, derive(element));
                }
                Ok(None) => {
                    tracing::debug!(position, "injection produced nothing");
                }
                Err(err) => {
                    tracing::warn!(position, error = %err, "injection failed, skipping slot");
                }
            }
        }
        StreamResult::new(is_exhaustive, elements)
    }
}

/// Positions chosen by an allocator for one page, plus its next state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InjectionAllocatorResult {
    positions: BTreeSet<usize>,
    state: Option<InjectorState>,
}

impl InjectionAllocatorResult {
    pub fn new(positions: BTreeSet<usize>, state: Option<InjectorState>) -> Self {
        Self { positions, state }
    }

    pub fn positions(&self) -> &BTreeSet<usize> {
        &self.positions
    }

    pub fn state(&self) -> Option<&InjectorState> {
        self.state.as_ref()
    }

    pub fn into_parts(self) -> (BTreeSet<usize>, Option<InjectorState>) {
        (self.positions, self.state)
    }
}

/// Chooses which output positions of a page receive injections.
pub trait InjectionAllocator: Send + Sync + Debug {
    fn allocate(&self, count: usize, state: Option<&InjectorState>)
        -> Result<InjectionAllocatorResult>;
}

/// Plans injections for a host operator.
pub trait StreamInjector: Send + Sync + Debug {
    fn plan_injection(
        &self,
        count: usize,
        host: &str,
        state: Option<&InjectorState>,
        tracer: Option<&dyn StreamTracer>,
    ) -> Result<InjectionPlan>;
}
