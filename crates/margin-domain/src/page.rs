//! Page groups - the complete set of elements for one physical page

use crate::ExtractionElement;

/// Every element belonging to one physical page, in document order
///
/// The page-boundary marker is held apart from `elements`, so the element
/// set never contains a PAGE marker. A group is only ever constructed once
/// the segmenter knows the page is complete.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGroup {
    /// 1-indexed page number
    pub page_number: u32,

    /// The PAGE marker that opened this page, if one was seen
    pub marker: Option<ExtractionElement>,

    /// Page content, excluding the marker
    pub elements: Vec<ExtractionElement>,
}

impl PageGroup {
    /// Create a page group
    pub fn new(
        page_number: u32,
        marker: Option<ExtractionElement>,
        elements: Vec<ExtractionElement>,
    ) -> Self {
        Self {
            page_number,
            marker,
            elements,
        }
    }

    /// All blocks of the page, marker first
    pub fn blocks(&self) -> impl Iterator<Item = &ExtractionElement> {
        self.marker.iter().chain(self.elements.iter())
    }

    /// Number of content elements (marker excluded)
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the page has no content elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
