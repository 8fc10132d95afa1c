//! Confidence policy - decides which pages need human review
//!
//! A page is "low confidence" when any confidence-bearing element scores
//! strictly below the threshold. Evaluation stops at the first such element;
//! the boolean outcome does not depend on element order.

use crate::{ElementKind, ExtractionElement, PageGroup};

/// Subset of elements a confidence query looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceScope {
    /// Every confidence-bearing kind (the page-level review gate)
    AllBearing,
    /// WORD elements
    Words,
    /// TABLE elements
    Tables,
    /// CELL and MERGED_CELL elements
    Cells,
    /// KEY_VALUE_SET elements tagged as keys
    FormKeys,
    /// KEY_VALUE_SET elements tagged as values
    FormValues,
}

impl ConfidenceScope {
    /// Whether `element` falls inside this scope
    pub fn includes(&self, element: &ExtractionElement) -> bool {
        match self {
            ConfidenceScope::AllBearing => element.kind.is_confidence_bearing(),
            ConfidenceScope::Words => element.kind == ElementKind::Word,
            ConfidenceScope::Tables => element.kind == ElementKind::Table,
            ConfidenceScope::Cells => {
                matches!(element.kind, ElementKind::Cell | ElementKind::MergedCell)
            }
            ConfidenceScope::FormKeys => {
                element.kind == ElementKind::KeyValueSet && element.has_entity_type("KEY")
            }
            ConfidenceScope::FormValues => {
                element.kind == ElementKind::KeyValueSet && element.has_entity_type("VALUE")
            }
        }
    }
}

/// Find the first in-scope element scoring strictly below `threshold`
///
/// Elements without a score never qualify.
pub fn first_below<'a, I>(
    elements: I,
    threshold: f64,
    scope: ConfidenceScope,
) -> Option<&'a ExtractionElement>
where
    I: IntoIterator<Item = &'a ExtractionElement>,
{
    elements.into_iter().find(|element| {
        scope.includes(element)
            && element
                .confidence
                .map(|score| score < threshold)
                .unwrap_or(false)
    })
}

/// Whether any confidence-bearing element scores strictly below `threshold`
///
/// # Examples
///
/// ```
/// use margin_domain::{is_low_confidence, ElementKind, ExtractionElement};
///
/// let page = vec![
///     ExtractionElement::page_marker(1),
///     ExtractionElement::new(ElementKind::Word, Some(40.0)),
/// ];
/// assert!(is_low_confidence(&page, 50.0));
/// assert!(!is_low_confidence(&page, 40.0));
/// ```
pub fn is_low_confidence(elements: &[ExtractionElement], threshold: f64) -> bool {
    first_below(elements, threshold, ConfidenceScope::AllBearing).is_some()
}

/// Review gate with a fixed threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidencePolicy {
    threshold: f64,
}

impl ConfidencePolicy {
    /// Create a policy; the threshold must be a finite score in [0, 100]
    pub fn new(threshold: f64) -> Result<Self, String> {
        if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
            return Err(format!(
                "Confidence threshold must be in [0, 100], got {}",
                threshold
            ));
        }
        Ok(Self { threshold })
    }

    /// The configured threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether the page needs human review
    pub fn requires_review(&self, page: &PageGroup) -> bool {
        is_low_confidence(&page.elements, self.threshold)
    }

    /// First element of `page` within `scope` that falls below the threshold
    pub fn offending_element<'a>(
        &self,
        page: &'a PageGroup,
        scope: ConfidenceScope,
    ) -> Option<&'a ExtractionElement> {
        first_below(&page.elements, self.threshold, scope)
    }

    /// Whether a WORD scores below the threshold
    pub fn low_word_confidence(&self, page: &PageGroup) -> bool {
        self.offending_element(page, ConfidenceScope::Words).is_some()
    }

    /// Whether a TABLE scores below the threshold
    pub fn low_table_confidence(&self, page: &PageGroup) -> bool {
        self.offending_element(page, ConfidenceScope::Tables).is_some()
    }

    /// Whether a table cell scores below the threshold
    pub fn low_cell_confidence(&self, page: &PageGroup) -> bool {
        self.offending_element(page, ConfidenceScope::Cells).is_some()
    }

    /// Whether a form key scores below the threshold
    pub fn low_form_key_confidence(&self, page: &PageGroup) -> bool {
        self.offending_element(page, ConfidenceScope::FormKeys).is_some()
    }

    /// Whether a form value scores below the threshold
    pub fn low_form_value_confidence(&self, page: &PageGroup) -> bool {
        self.offending_element(page, ConfidenceScope::FormValues).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn el(kind: ElementKind, confidence: f64) -> ExtractionElement {
        ExtractionElement::new(kind, Some(confidence))
    }

    fn page(elements: Vec<ExtractionElement>) -> PageGroup {
        PageGroup::new(1, Some(ExtractionElement::page_marker(1)), elements)
    }

    #[test]
    fn test_empty_input_is_not_low() {
        assert!(!is_low_confidence(&[], 50.0));
    }

    #[test]
    fn test_page_markers_only_is_not_low() {
        let markers = vec![
            ExtractionElement::page_marker(1),
            ExtractionElement::page_marker(2),
        ];
        assert!(!is_low_confidence(&markers, 100.0));
    }

    #[test]
    fn test_each_bearing_kind_triggers() {
        for kind in [
            ElementKind::Word,
            ElementKind::Table,
            ElementKind::Cell,
            ElementKind::MergedCell,
            ElementKind::KeyValueSet,
            ElementKind::Signature,
        ] {
            assert!(
                is_low_confidence(&[el(kind.clone(), 10.0)], 50.0),
                "{} should trigger review",
                kind
            );
        }
    }

    #[test]
    fn test_non_bearing_kinds_are_ignored() {
        let elements = vec![
            el(ElementKind::Line, 1.0),
            el(ElementKind::SelectionElement, 1.0),
            el(ElementKind::Other("QUERY".to_string()), 1.0),
        ];
        assert!(!is_low_confidence(&elements, 50.0));
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!is_low_confidence(&[el(ElementKind::Word, 50.0)], 50.0));
        assert!(is_low_confidence(&[el(ElementKind::Word, 49.99)], 50.0));
    }

    #[test]
    fn test_missing_score_never_qualifies() {
        let unscored = ExtractionElement::new(ElementKind::Word, None);
        assert!(!is_low_confidence(&[unscored], 50.0));
    }

    #[test]
    fn test_first_below_returns_first_match() {
        let elements = vec![
            el(ElementKind::Word, 90.0),
            el(ElementKind::Table, 20.0).with_attribute("Id", json!("t1")),
            el(ElementKind::Word, 10.0),
        ];
        let found = first_below(&elements, 50.0, ConfidenceScope::AllBearing).unwrap();
        assert_eq!(found.payload["Id"], json!("t1"));
    }

    #[test]
    fn test_policy_rejects_out_of_range_thresholds() {
        assert!(ConfidencePolicy::new(-1.0).is_err());
        assert!(ConfidencePolicy::new(100.5).is_err());
        assert!(ConfidencePolicy::new(f64::NAN).is_err());
        assert_eq!(ConfidencePolicy::new(75.0).unwrap().threshold(), 75.0);
    }

    #[test]
    fn test_scoped_evaluators() {
        let policy = ConfidencePolicy::new(50.0).unwrap();
        let key = el(ElementKind::KeyValueSet, 30.0).with_attribute("EntityTypes", json!(["KEY"]));
        let value =
            el(ElementKind::KeyValueSet, 95.0).with_attribute("EntityTypes", json!(["VALUE"]));
        let p = page(vec![
            el(ElementKind::Word, 99.0),
            el(ElementKind::Table, 99.0),
            el(ElementKind::MergedCell, 12.0),
            key,
            value,
        ]);

        assert!(policy.requires_review(&p));
        assert!(!policy.low_word_confidence(&p));
        assert!(!policy.low_table_confidence(&p));
        assert!(policy.low_cell_confidence(&p));
        assert!(policy.low_form_key_confidence(&p));
        assert!(!policy.low_form_value_confidence(&p));
    }

    #[test]
    fn test_marker_is_not_evaluated() {
        let policy = ConfidencePolicy::new(50.0).unwrap();
        let mut marker = ExtractionElement::page_marker(1);
        marker.confidence = Some(1.0);
        let p = PageGroup::new(1, Some(marker), vec![el(ElementKind::Word, 80.0)]);
        assert!(!policy.requires_review(&p));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn kind_strategy() -> impl Strategy<Value = ElementKind> {
        prop_oneof![
            Just(ElementKind::Page),
            Just(ElementKind::Line),
            Just(ElementKind::Word),
            Just(ElementKind::Table),
            Just(ElementKind::Cell),
            Just(ElementKind::MergedCell),
            Just(ElementKind::KeyValueSet),
            Just(ElementKind::SelectionElement),
            Just(ElementKind::Signature),
        ]
    }

    fn element_strategy() -> impl Strategy<Value = ExtractionElement> {
        (kind_strategy(), proptest::option::of(0.0f64..=100.0))
            .prop_map(|(kind, confidence)| ExtractionElement::new(kind, confidence))
    }

    proptest! {
        /// Property: the outcome matches the "exists a bearing element below threshold" definition
        #[test]
        fn test_matches_definition(
            elements in proptest::collection::vec(element_strategy(), 0..40),
            threshold in 0.0f64..=100.0,
        ) {
            let expected = elements.iter().any(|e| {
                e.kind.is_confidence_bearing() && e.confidence.map_or(false, |c| c < threshold)
            });
            prop_assert_eq!(is_low_confidence(&elements, threshold), expected);
        }

        /// Property: shuffling a page never changes the outcome
        #[test]
        fn test_order_insensitive(
            (elements, shuffled) in proptest::collection::vec(element_strategy(), 0..40)
                .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle())),
            threshold in 0.0f64..=100.0,
        ) {
            prop_assert_eq!(
                is_low_confidence(&elements, threshold),
                is_low_confidence(&shuffled, threshold)
            );
        }
    }
}
