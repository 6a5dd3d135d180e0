//! GPX document model deserialized with quick-xml

use quick_xml::de::from_str;
use serde::Deserialize;

use super::extract;
use super::{RawPoint, RawRoute};
use crate::{Result, RoutecastError};

/// GPX root element. Only the parts needed to build a route are modelled, everything
/// else (extensions, links, bounds) is skipped by the deserializer.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GpxDocument {
    pub metadata: Option<GpxMetadata>,
    /// GPX 1.0 keeps the document name directly under the root
    pub name: Option<String>,
    #[serde(rename = "wpt")]
    pub waypoints: Vec<GpxPoint>,
    #[serde(rename = "rte")]
    pub routes: Vec<GpxRoute>,
    #[serde(rename = "trk")]
    pub tracks: Vec<GpxTrack>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GpxMetadata {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GpxTrack {
    pub name: Option<String>,
    #[serde(rename = "trkseg")]
    pub segments: Vec<GpxSegment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GpxSegment {
    #[serde(rename = "trkpt")]
    pub points: Vec<GpxPoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GpxRoute {
    pub name: Option<String>,
    #[serde(rename = "rtept")]
    pub points: Vec<GpxPoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GpxPoint {
    #[serde(rename = "@lat")]
    pub lat: Option<String>,
    #[serde(rename = "@lon")]
    pub lon: Option<String>,
    pub ele: Option<String>,
    pub time: Option<String>,
}

impl From<GpxPoint> for RawPoint {
    fn from(point: GpxPoint) -> Self {
        RawPoint {
            lat: point.lat.unwrap_or_default(),
            lon: point.lon.unwrap_or_default(),
            ele: point.ele,
            time: point.time,
        }
    }
}

impl GpxDocument {
    /// Deserialize a GPX document
    pub fn parse(text: &str) -> Result<Self> {
        from_str(text).map_err(|e| RoutecastError::parse(format!("Failed to parse GPX XML: {e}")))
    }

    /// Route name by priority: document name, track name, route name
    #[must_use]
    pub fn route_name(&self) -> Option<String> {
        let document_name = self
            .metadata
            .as_ref()
            .and_then(|metadata| metadata.name.as_deref())
            .or(self.name.as_deref());

        document_name
            .or_else(|| self.tracks.iter().find_map(|track| track.name.as_deref()))
            .or_else(|| self.routes.iter().find_map(|route| route.name.as_deref()))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Track points of every segment in document order, else route points, else waypoints
    #[must_use]
    pub fn into_points(self) -> Vec<RawPoint> {
        let track_points: Vec<RawPoint> = self
            .tracks
            .into_iter()
            .flat_map(|track| track.segments)
            .flat_map(|segment| segment.points)
            .map(RawPoint::from)
            .collect();
        if !track_points.is_empty() {
            return track_points;
        }

        let route_points: Vec<RawPoint> = self
            .routes
            .into_iter()
            .flat_map(|route| route.points)
            .map(RawPoint::from)
            .collect();
        if !route_points.is_empty() {
            return route_points;
        }

        self.waypoints.into_iter().map(RawPoint::from).collect()
    }
}

/// Structured parse of a (repaired) document into a raw route.
///
/// Falls back from the typed GPX structure to generic point-like elements and then to
/// any element carrying coordinate attributes before giving up.
pub fn parse_structured(text: &str) -> Result<RawRoute> {
    let document = GpxDocument::parse(text)?;

    let name = document
        .route_name()
        .or_else(|| extract::first_name(text));

    let mut points = document.into_points();
    if points.is_empty() {
        points = extract::point_like_elements(text);
    }
    if points.is_empty() {
        points = extract::elements_with_coordinates(text);
    }
    if points.is_empty() {
        return Err(RoutecastError::parse(
            "Document contains no track points, route points or waypoints",
        ));
    }

    Ok(RawRoute { name, points })
}
