//! Ordered fallback chain used to recover a route from a document

use serde::Serialize;
use std::fmt;

use super::document::parse_structured;
use super::extract;
use super::{RawPoint, RawRoute};
use crate::{Result, RoutecastError};

/// The stage of the fallback chain that produced a route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseStrategy {
    /// The repaired document deserialized as GPX
    Structured,
    /// Deserialized after removing every namespace prefix
    NamespacesStripped,
    /// Points were pattern-matched out of the text and re-assembled into a document
    PatternExtracted,
    /// All real attempts failed and the fixed sample route was substituted
    Placeholder,
}

impl fmt::Display for ParseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParseStrategy::Structured => "structured",
            ParseStrategy::NamespacesStripped => "namespaces stripped",
            ParseStrategy::PatternExtracted => "pattern extracted",
            ParseStrategy::Placeholder => "placeholder",
        };
        f.write_str(label)
    }
}

/// A pure recovery attempt over repaired document text
pub type Strategy = fn(&str) -> Result<RawRoute>;

/// Recovery attempts in the order they are tried. The placeholder is not part of the
/// chain: it is only used when degraded mode is enabled.
pub const FALLBACK_CHAIN: &[(ParseStrategy, Strategy)] = &[
    (ParseStrategy::Structured, structured),
    (ParseStrategy::NamespacesStripped, namespaces_stripped),
    (ParseStrategy::PatternExtracted, pattern_extracted),
];

pub const PLACEHOLDER_ROUTE_NAME: &str = "Sample Route";

fn structured(text: &str) -> Result<RawRoute> {
    parse_structured(text)
}

fn namespaces_stripped(text: &str) -> Result<RawRoute> {
    parse_structured(&extract::strip_namespace_prefixes(text))
}

fn pattern_extracted(text: &str) -> Result<RawRoute> {
    let mut points = extract::point_like_elements(text);
    if points.is_empty() {
        points = extract::elements_with_coordinates(text);
    }
    if points.is_empty() {
        return Err(RoutecastError::parse(
            "No coordinates could be found anywhere in the document",
        ));
    }

    let name = extract::route_name(text);
    let document = extract::synthesize_document(name.as_deref(), &points);
    parse_structured(&document)
}

/// Fixed sample route used by degraded mode
pub fn placeholder() -> RawRoute {
    const SAMPLE: &[(&str, &str, &str)] = &[
        ("47.6062", "-122.3321", "50"),
        ("47.6205", "-122.3493", "60"),
        ("47.6400", "-122.3700", "80"),
        ("47.6600", "-122.3900", "70"),
        ("47.6800", "-122.4000", "55"),
    ];

    RawRoute {
        name: Some(PLACEHOLDER_ROUTE_NAME.to_string()),
        points: SAMPLE
            .iter()
            .map(|(lat, lon, ele)| RawPoint {
                lat: (*lat).to_string(),
                lon: (*lon).to_string(),
                ele: Some((*ele).to_string()),
                time: None,
            })
            .collect(),
    }
}
