//! Immutable result pages.

use serde::{Deserialize, Serialize};

use crate::cursor::StreamCursor;
use crate::element::StreamElement;
use crate::error::Result;

/// One page of elements plus an exhaustion flag.
///
/// An empty page is always exhaustive, whatever flag it was built with.
///
/// # Example
///
/// ```
/// use feedforge_core::StreamResult;
///
/// let result = StreamResult::new(false, Vec::new());
/// assert!(result.is_exhaustive());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStreamResult")]
pub struct StreamResult {
    is_exhaustive: bool,
    elements: Vec<StreamElement>,
}

#[derive(Deserialize)]
struct RawStreamResult {
    is_exhaustive: bool,
    #[serde(default)]
    elements: Vec<StreamElement>,
}

impl From<RawStreamResult> for StreamResult {
    fn from(raw: RawStreamResult) -> Self {
        Self::new(raw.is_exhaustive, raw.elements)
    }
}

impl StreamResult {
    /// Creates a page; `is_exhaustive` is forced to true when `elements` is empty.
    pub fn new(is_exhaustive: bool, elements: Vec<StreamElement>) -> Self {
        Self {
            is_exhaustive: is_exhaustive || elements.is_empty(),
            elements,
        }
    }

    /// Creates the empty, exhaustive page.
    pub fn empty() -> Self {
        Self::new(true, Vec::new())
    }

    pub fn is_exhaustive(&self) -> bool {
        self.is_exhaustive
    }

    pub fn elements(&self) -> &[StreamElement] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<StreamElement> {
        self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Folds every element cursor into one summary position for this page.
    pub fn combined_cursor(&self) -> Result<Option<StreamCursor>> {
        StreamCursor::combine_all(self.elements.iter().map(StreamElement::cursor))
    }

    /// Tags every element with `component` unless it already carries one.
    pub fn with_component(mut self, component: &str) -> Self {
        for element in &mut self.elements {
            element.set_component_if_absent(component);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::OriginalElement;

    fn element(id: &str, offset: u64) -> StreamElement {
        StreamElement::new(OriginalElement::new("posts", id))
            .derive("posts", Some(StreamCursor::offset(offset)))
    }

    #[test]
    fn empty_result_is_always_exhaustive() {
        assert!(StreamResult::new(false, Vec::new()).is_exhaustive());
        assert!(StreamResult::empty().is_exhaustive());
        assert!(!StreamResult::new(false, vec![element("a", 1)]).is_exhaustive());
    }

    #[test]
    fn deserializing_restores_invariant() {
        let result: StreamResult =
            serde_json::from_str(r#"{"is_exhaustive": false, "elements": []}"#).unwrap();
        assert!(result.is_exhaustive());
    }

    #[test]
    fn combined_cursor_folds_page() {
        let result = StreamResult::new(false, vec![element("a", 1), element("b", 2)]);
        assert_eq!(
            result.combined_cursor().unwrap(),
            Some(StreamCursor::offset(2))
        );
        assert_eq!(StreamResult::empty().combined_cursor().unwrap(), None);
    }
}
