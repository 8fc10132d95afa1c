//! Extraction elements - the blocks an extraction pass produces for a page

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Kind of a recognized element
///
/// Known kinds get their own variant; anything else the extraction service
/// emits is preserved verbatim in [`ElementKind::Other`] so it can be
/// re-serialized unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementKind {
    /// Page-boundary marker (carries no confidence)
    Page,
    /// Line of text
    Line,
    /// Single word
    Word,
    /// Table structure
    Table,
    /// Table cell
    Cell,
    /// Cell spanning several rows or columns
    MergedCell,
    /// Key or value component of a form field
    KeyValueSet,
    /// Checkbox or radio button
    SelectionElement,
    /// Handwritten signature
    Signature,
    /// Any other element kind
    Other(String),
}

impl ElementKind {
    /// Get the wire name of the kind
    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Page => "PAGE",
            ElementKind::Line => "LINE",
            ElementKind::Word => "WORD",
            ElementKind::Table => "TABLE",
            ElementKind::Cell => "CELL",
            ElementKind::MergedCell => "MERGED_CELL",
            ElementKind::KeyValueSet => "KEY_VALUE_SET",
            ElementKind::SelectionElement => "SELECTION_ELEMENT",
            ElementKind::Signature => "SIGNATURE",
            ElementKind::Other(name) => name,
        }
    }

    /// Parse a kind from its wire name
    pub fn parse(s: &str) -> Self {
        match s {
            "PAGE" => ElementKind::Page,
            "LINE" => ElementKind::Line,
            "WORD" => ElementKind::Word,
            "TABLE" => ElementKind::Table,
            "CELL" => ElementKind::Cell,
            "MERGED_CELL" => ElementKind::MergedCell,
            "KEY_VALUE_SET" => ElementKind::KeyValueSet,
            "SELECTION_ELEMENT" => ElementKind::SelectionElement,
            "SIGNATURE" => ElementKind::Signature,
            other => ElementKind::Other(other.to_string()),
        }
    }

    /// Whether elements of this kind are subject to the review gate
    pub fn is_confidence_bearing(&self) -> bool {
        matches!(
            self,
            ElementKind::Word
                | ElementKind::Table
                | ElementKind::Cell
                | ElementKind::MergedCell
                | ElementKind::KeyValueSet
                | ElementKind::Signature
        )
    }
}

impl From<String> for ElementKind {
    fn from(s: String) -> Self {
        ElementKind::parse(&s)
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognized unit within a page
///
/// Geometry, text, relationships and every other attribute are kept in
/// `payload` as opaque pass-through data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionElement {
    /// Element kind
    #[serde(rename = "BlockType")]
    pub kind: ElementKind,

    /// Confidence score in [0, 100]; absent for page markers
    #[serde(rename = "Confidence", default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Page number; synchronous-style results omit it
    #[serde(rename = "Page", default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    /// Remaining attributes, untouched
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ExtractionElement {
    /// Create an element with an empty payload
    pub fn new(kind: ElementKind, confidence: Option<f64>) -> Self {
        Self {
            kind,
            confidence,
            page: None,
            payload: Map::new(),
        }
    }

    /// Create a page-boundary marker
    pub fn page_marker(page: u32) -> Self {
        Self {
            kind: ElementKind::Page,
            confidence: None,
            page: Some(page),
            payload: Map::new(),
        }
    }

    /// Set the page number
    pub fn on_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Add a payload attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.payload.insert(name.into(), value);
        self
    }

    /// Whether this element marks a page boundary
    pub fn is_page_marker(&self) -> bool {
        self.kind == ElementKind::Page
    }

    /// Whether the payload lists `entity_type` under `EntityTypes`
    ///
    /// Form fields use this to tell keys (`KEY`) from values (`VALUE`).
    pub fn has_entity_type(&self, entity_type: &str) -> bool {
        self.payload
            .get("EntityTypes")
            .and_then(Value::as_array)
            .map(|types| types.iter().any(|t| t.as_str() == Some(entity_type)))
            .unwrap_or(false)
    }

    /// Remove null values from the payload, recursively
    pub fn strip_nulls(&mut self) {
        self.payload.retain(|_, v| !v.is_null());
        for value in self.payload.values_mut() {
            strip_nulls(value);
        }
    }
}

/// Remove nulls from arrays and objects, recursively
///
/// Sparse optional fields are normalized to "not present" rather than null.
pub fn strip_nulls(value: &mut Value) {
    match value {
        Value::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(strip_nulls);
        }
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        _ => {}
    }
}
