//! Pattern-based extraction of route data from documents too damaged to deserialize

use quick_xml::escape::{escape, unescape};
use regex::{Captures, Regex};
use std::fmt::Write;
use std::sync::LazyLock;

use super::RawPoint;

/// How far past an element start to look for its end tag
const MAX_ELEMENT_BODY: usize = 8 * 1024;

static POINT_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<(?:[A-Za-z_][\w.-]*:)?(trkpt|rtept|wpt|trackpoint|waypoint|point|pt)(\s[^<>]*?)?(/?)>",
    )
    .expect("valid point element regex")
});
static ANY_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?([A-Za-z_][\w.-]*)(\s[^<>]*?)?(/?)>")
        .expect("valid element regex")
});
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:[A-Za-z_][\w.-]*:)?([A-Za-z_][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});
static ELEVATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?ele(?:\s[^<>]*)?>\s*([^<]*)").expect("valid ele regex")
});
static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?time(?:\s[^<>]*)?>\s*([^<]*)").expect("valid time regex")
});
static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[A-Za-z_][\w.-]*:)?name(?:\s[^<>]*)?>\s*(?:<!\[CDATA\[(.*?)\]\]>|([^<]*))")
        .expect("valid name regex")
});
static TRACK_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?trk[\s>]").expect("valid track start regex")
});
static ROUTE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?rte[\s>]").expect("valid route start regex")
});
/// Start or end of a container or point element, where a leading `name` stops belonging to
/// the current scope
static SCOPE_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?(?:[A-Za-z_][\w.-]*:)?(?:trk|trkseg|trkpt|rte|rtept|wpt)[\s/>]")
        .expect("valid scope boundary regex")
});
static TAG_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(/?)[A-Za-z_][\w.-]*:([A-Za-z_])").expect("valid tag prefix regex")
});
static NAMESPACE_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+xmlns:[A-Za-z_][\w.-]*\s*=\s*(?:"[^"]*"|'[^']*')"#)
        .expect("valid namespace declaration regex")
});
static ATTRIBUTE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\s)[A-Za-z_][\w.-]*:([A-Za-z_][\w.-]*\s*=\s*["'])"#)
        .expect("valid attribute prefix regex")
});

/// Remove every namespace declaration and prefix from element and attribute names
pub fn strip_namespace_prefixes(text: &str) -> String {
    let text = NAMESPACE_DECLARATION.replace_all(text, "");
    let text = TAG_PREFIX.replace_all(&text, "<${1}${2}");
    ATTRIBUTE_PREFIX.replace_all(&text, "${1}${2}").into_owned()
}

/// Elements named like points that carry coordinates.
///
/// Only one kind is returned, the first non-empty of track points, route points, waypoints
/// and then any other point-like element, each in document order.
pub fn point_like_elements(text: &str) -> Vec<RawPoint> {
    let mut groups: [Vec<RawPoint>; 4] = Default::default();
    for caps in POINT_LIKE.captures_iter(text) {
        let Some(kind) = caps.get(1) else {
            continue;
        };
        let rank = match kind.as_str() {
            "trkpt" => 0,
            "rtept" => 1,
            "wpt" => 2,
            _ => 3,
        };
        if let Some(point) = point_from_element(text, &caps) {
            groups[rank].push(point);
        }
    }
    groups
        .into_iter()
        .find(|group| !group.is_empty())
        .unwrap_or_default()
}

/// Any element carrying latitude and longitude attributes
pub fn elements_with_coordinates(text: &str) -> Vec<RawPoint> {
    scan_elements(text, &ANY_ELEMENT)
}

/// Route name by priority: document name, first track name, first route name, any name.
///
/// Works on damaged text, so each scope ends at the next track, route or point element
/// rather than at a matching end tag.
pub fn route_name(text: &str) -> Option<String> {
    let document_end = SCOPE_BOUNDARY.find(text).map_or(text.len(), |m| m.start());
    first_name(&text[..document_end])
        .or_else(|| container_name(text, &TRACK_START))
        .or_else(|| container_name(text, &ROUTE_START))
        .or_else(|| first_name(text))
}

fn container_name(text: &str, start: &Regex) -> Option<String> {
    start.find_iter(text).find_map(|container| {
        let rest = &text[container.end()..];
        let end = SCOPE_BOUNDARY.find(rest).map_or(rest.len(), |m| m.start());
        first_name(&rest[..end])
    })
}

/// First non-empty `name` element anywhere in the document
pub fn first_name(text: &str) -> Option<String> {
    NAME.captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| decode_text(m.as_str()))
        .find(|name| !name.is_empty())
}

/// Build a minimal GPX 1.1 document holding the given points as one track
pub fn synthesize_document(name: Option<&str>, points: &[RawPoint]) -> String {
    let mut document = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<gpx version=\"1.1\" creator=\"routecast\">\n",
    );
    if let Some(name) = name {
        let _ = writeln!(document, "  <metadata><name>{}</name></metadata>", escape(name));
    }
    document.push_str("  <trk><trkseg>\n");
    for point in points {
        let _ = write!(
            document,
            "    <trkpt lat=\"{}\" lon=\"{}\">",
            escape(&point.lat),
            escape(&point.lon)
        );
        if let Some(ele) = &point.ele {
            let _ = write!(document, "<ele>{}</ele>", escape(ele));
        }
        if let Some(time) = &point.time {
            let _ = write!(document, "<time>{}</time>", escape(time));
        }
        document.push_str("</trkpt>\n");
    }
    document.push_str("  </trkseg></trk>\n</gpx>\n");
    document
}

fn scan_elements(text: &str, element: &Regex) -> Vec<RawPoint> {
    element
        .captures_iter(text)
        .filter_map(|caps| point_from_element(text, &caps))
        .collect()
}

fn point_from_element(text: &str, caps: &Captures) -> Option<RawPoint> {
    let tag = caps.get(0)?;
    let name = caps.get(1)?.as_str();
    let attributes = caps.get(2).map_or("", |m| m.as_str());
    let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());

    let mut lat = None;
    let mut lon = None;
    for attribute in ATTRIBUTE.captures_iter(attributes) {
        let Some(key) = attribute.get(1) else {
            continue;
        };
        let value = attribute
            .get(2)
            .or_else(|| attribute.get(3))
            .map_or("", |m| m.as_str());
        match key.as_str() {
            "lat" | "latitude" => lat = Some(decode_text(value)),
            "lon" | "lng" | "longitude" => lon = Some(decode_text(value)),
            _ => {}
        }
    }
    let (lat, lon) = (lat?, lon?);

    let body = if self_closing {
        ""
    } else {
        element_body(&text[tag.end()..], name)
    };

    Some(RawPoint {
        lat,
        lon,
        ele: child_text(body, &ELEVATION),
        time: child_text(body, &TIME),
    })
}

/// Text up to the element's end tag, bounded so broken documents stay linear
fn element_body<'a>(rest: &'a str, name: &str) -> &'a str {
    let mut limit = rest.len().min(MAX_ELEMENT_BODY);
    while !rest.is_char_boundary(limit) {
        limit -= 1;
    }
    let window = &rest[..limit];

    for (index, _) in window.match_indices("</") {
        let tag = &window[index + 2..];
        let local = match tag.find(|c: char| c == '>' || c.is_whitespace()) {
            Some(end) => &tag[..end],
            None => tag,
        };
        let local = local.rsplit(':').next().unwrap_or(local);
        if local == name {
            return &window[..index];
        }
    }
    window
}

fn child_text(body: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| decode_text(m.as_str()))
        .filter(|value| !value.is_empty())
}

fn decode_text(raw: &str) -> String {
    let trimmed = raw.trim();
    unescape(trimmed)
        .map(|text| text.into_owned())
        .unwrap_or_else(|_| trimmed.to_string())
}
