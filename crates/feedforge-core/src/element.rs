//! Stream elements and their provenance.
//!
//! An element is one shared [`OriginalElement`] plus an explicit list of
//! [`Derivation`] frames, innermost first. Each operator that passes an element
//! upward pushes a frame naming itself and the cursor that resumes past the
//! element in that operator. Reaching the original is O(1); walking the chain
//! is O(depth).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cursor::StreamCursor;

/// The innermost content item, as produced by a leaf source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OriginalElement {
    provider_id: String,
    element_id: String,
    #[serde(default)]
    timestamp_ms: Option<i64>,
    #[serde(default)]
    cursor: Option<StreamCursor>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
}

impl OriginalElement {
    /// Creates an element identified by `element_id` within `provider_id`.
    pub fn new(provider_id: impl Into<String>, element_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            element_id: element_id.into(),
            timestamp_ms: None,
            cursor: None,
            attributes: BTreeMap::new(),
        }
    }

    /// Sets the creation timestamp used by chronological operators.
    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// Sets the cursor that resumes past this element in its source.
    pub fn with_cursor(mut self, cursor: StreamCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Adds a free-form attribute (ranking signals, content type, ...).
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        self.timestamp_ms
    }

    pub fn cursor(&self) -> Option<&StreamCursor> {
        self.cursor.as_ref()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// One provenance frame: which operator produced the element and where it resumes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    producer: String,
    cursor: Option<StreamCursor>,
}

impl Derivation {
    pub fn producer(&self) -> &str {
        &self.producer
    }

    pub fn cursor(&self) -> Option<&StreamCursor> {
        self.cursor.as_ref()
    }
}

/// A content item travelling through the operator tree.
///
/// # Example
///
/// ```
/// use feedforge_core::{OriginalElement, StreamCursor, StreamElement};
///
/// let leaf = StreamElement::new(OriginalElement::new("posts", "42"));
/// let derived = leaf.derive("dashboard", Some(StreamCursor::offset(1)));
///
/// assert_eq!(derived.element_id(), "42");
/// assert_eq!(derived.producer(), "dashboard");
/// assert_eq!(derived.cursor(), Some(&StreamCursor::offset(1)));
/// assert_eq!(derived.depth(), 1);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamElement {
    original: Arc<OriginalElement>,
    #[serde(default)]
    derivations: Vec<Derivation>,
    #[serde(default)]
    component: Option<String>,
}

impl StreamElement {
    /// Wraps an original element with no provenance frames.
    pub fn new(original: OriginalElement) -> Self {
        Self {
            original: Arc::new(original),
            derivations: Vec::new(),
            component: None,
        }
    }

    /// Returns a copy of this element derived by `producer`, resuming at `cursor`.
    ///
    /// The original element is shared, not cloned. The component tag carries over.
    pub fn derive(&self, producer: &str, cursor: Option<StreamCursor>) -> Self {
        let mut derivations = Vec::with_capacity(self.derivations.len() + 1);
        derivations.extend(self.derivations.iter().cloned());
        derivations.push(Derivation {
            producer: producer.to_string(),
            cursor,
        });
        Self {
            original: Arc::clone(&self.original),
            derivations,
            component: self.component.clone(),
        }
    }

    pub fn original(&self) -> &OriginalElement {
        &self.original
    }

    pub fn provider_id(&self) -> &str {
        self.original.provider_id()
    }

    pub fn element_id(&self) -> &str {
        self.original.element_id()
    }

    pub fn timestamp_ms(&self) -> Option<i64> {
        self.original.timestamp_ms()
    }

    /// Stable identity used for deduplication and buffer bookkeeping.
    pub fn key(&self) -> String {
        format!("{}/{}", self.original.provider_id, self.original.element_id)
    }

    /// The cursor that resumes past this element in its most recent producer.
    pub fn cursor(&self) -> Option<&StreamCursor> {
        match self.derivations.last() {
            Some(frame) => frame.cursor(),
            None => self.original.cursor(),
        }
    }

    /// Identity of the operator that most recently produced this element.
    pub fn producer(&self) -> &str {
        match self.derivations.last() {
            Some(frame) => frame.producer(),
            None => self.original.provider_id(),
        }
    }

    /// Provenance frames, innermost first.
    pub fn derivations(&self) -> &[Derivation] {
        &self.derivations
    }

    pub fn depth(&self) -> usize {
        self.derivations.len()
    }

    pub fn is_derived(&self) -> bool {
        !self.derivations.is_empty()
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    /// Tags the element with a component unless a deeper operator already did.
    pub fn set_component_if_absent(&mut self, component: &str) {
        if self.component.is_none() {
            self.component = Some(component.to_string());
        }
    }
}
