//! Structural repairs applied to route documents before they are parsed
//!
//! Recorded GPX files from devices and web exporters are frequently damaged in a
//! handful of recurring ways. Each repair here is a plain text transformation that
//! leaves well-formed documents untouched.

use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

/// Namespace prefixes commonly found in GPX extensions, mapped to their URIs
pub const DEFAULT_NAMESPACES: &[(&str, &str)] = &[
    ("gpxx", "http://www.garmin.com/xmlschemas/GpxExtensions/v3"),
    ("gpxtpx", "http://www.garmin.com/xmlschemas/TrackPointExtension/v1"),
    ("gpxtrx", "http://www.garmin.com/xmlschemas/GpxExtensions/v3"),
    ("gpxtrkx", "http://www.garmin.com/xmlschemas/TrackStatsExtension/v1"),
    ("gpxwpx", "http://www.garmin.com/xmlschemas/WaypointExtension/v1"),
    ("gpxpx", "http://www.garmin.com/xmlschemas/PowerExtension/v1"),
    ("wptx1", "http://www.garmin.com/xmlschemas/WaypointExtension/v1"),
    ("ctx", "http://www.garmin.com/xmlschemas/CreationTimeExtension/v1"),
    ("trp", "http://www.garmin.com/xmlschemas/TripExtensions/v1"),
    ("adv", "http://www.garmin.com/xmlschemas/AdventuresExtensions/v1"),
    ("prs", "http://www.garmin.com/xmlschemas/PressureExtension/v1"),
    ("tmd", "http://www.garmin.com/xmlschemas/TripMetaDataExtensions/v1"),
    ("vptm", "http://www.garmin.com/xmlschemas/ViaPointTransportationModeExtensions/v1"),
    ("ns3", "http://www.garmin.com/xmlschemas/TrackPointExtension/v1"),
    ("gpxdata", "http://www.cluetrust.com/XML/GPXDATA/1/0"),
    ("xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    ("locus", "https://www.locusmap.app"),
    ("opencpn", "http://www.opencpn.org"),
    ("osmand", "https://osmand.net"),
];

/// Leaf elements that carry only text and are commonly left unterminated
const LEAF_ELEMENTS: &[&str] = &["ele", "time", "name", "desc", "cmt", "sym", "type", "src"];

const PREDEFINED_ENTITIES: &[&str] = &["amp;", "lt;", "gt;", "quot;", "apos;"];

static ELEMENT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?([A-Za-z_][\w.-]*):[A-Za-z_]").expect("valid element prefix regex")
});
static ATTRIBUTE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s([A-Za-z_][\w.-]*):[A-Za-z_][\w.-]*\s*=\s*["']"#)
        .expect("valid attribute prefix regex")
});
static DECLARED_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"xmlns:([A-Za-z_][\w.-]*)\s*=").expect("valid namespace declaration regex")
});
static ROOT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][\w.:-]*)").expect("valid root element regex")
});
static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F\x{FFFE}\x{FFFF}]")
        .expect("valid control character regex")
});
static PROLOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\?xml\s[^>]*\?>").expect("valid prolog regex"));
static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<!DOCTYPE[^>]*>").expect("valid doctype regex"));
static LEAF_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"<({})(\s[^<>]*)?>", LEAF_ELEMENTS.join("|")))
        .expect("valid leaf element regex")
});
static AMPERSAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#x[0-9A-Fa-f]+;|#[0-9]+;|[A-Za-z][A-Za-z0-9]*;)?").expect("valid entity regex")
});

/// A repair applied to the raw document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// Declarations injected for prefixes used without one
    NamespacesDeclared(Vec<String>),
    ControlCharactersStripped(usize),
    DuplicateDeclarationsRemoved(usize),
    StrayAmpersandsEscaped(usize),
    LeafElementsClosed(usize),
    /// Content after the first complete root element was discarded
    ExtraRootsRemoved,
}

/// Apply every repair in order, returning the repaired text and what was changed
pub fn repair(text: &str, namespaces: &[(&str, &str)]) -> (String, Vec<Repair>) {
    let mut repairs = Vec::new();
    let text = text.trim_start_matches('\u{feff}').trim();

    let (text, declared) = declare_missing_namespaces(text, namespaces);
    if !declared.is_empty() {
        repairs.push(Repair::NamespacesDeclared(declared));
    }

    let (text, stripped) = strip_control_characters(&text);
    if stripped > 0 {
        repairs.push(Repair::ControlCharactersStripped(stripped));
    }

    let (text, removed) = remove_duplicate_declarations(&text);
    if removed > 0 {
        repairs.push(Repair::DuplicateDeclarationsRemoved(removed));
    }

    let (text, escaped) = escape_stray_ampersands(&text);
    if escaped > 0 {
        repairs.push(Repair::StrayAmpersandsEscaped(escaped));
    }

    let (text, closed) = close_leaf_elements(&text);
    if closed > 0 {
        repairs.push(Repair::LeafElementsClosed(closed));
    }

    let (text, truncated) = keep_first_root(&text);
    if truncated {
        repairs.push(Repair::ExtraRootsRemoved);
    }

    if !repairs.is_empty() {
        debug!("Applied document repairs: {:?}", repairs);
    }

    (text, repairs)
}

/// Inject `xmlns:` declarations on the root element for known prefixes used without one
pub fn declare_missing_namespaces(text: &str, namespaces: &[(&str, &str)]) -> (String, Vec<String>) {
    let used: BTreeSet<&str> = ELEMENT_PREFIX
        .captures_iter(text)
        .chain(ATTRIBUTE_PREFIX.captures_iter(text))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|prefix| *prefix != "xmlns" && *prefix != "xml")
        .collect();

    let declared: BTreeSet<&str> = DECLARED_PREFIX
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    let mut injected = Vec::new();
    let mut declarations = String::new();
    for prefix in used.difference(&declared) {
        match namespaces.iter().find(|(known, _)| known == prefix) {
            Some((known, uri)) => {
                declarations.push_str(&format!(" xmlns:{known}=\"{uri}\""));
                injected.push((*known).to_string());
            }
            None => debug!("Undeclared namespace prefix '{}' is not a known extension", prefix),
        }
    }

    if injected.is_empty() {
        return (text.to_string(), injected);
    }

    match ROOT_START.find(text) {
        Some(root) => {
            let mut repaired = String::with_capacity(text.len() + declarations.len());
            repaired.push_str(&text[..root.end()]);
            repaired.push_str(&declarations);
            repaired.push_str(&text[root.end()..]);
            (repaired, injected)
        }
        None => (text.to_string(), Vec::new()),
    }
}

/// Remove characters that are not allowed anywhere in an XML document
pub fn strip_control_characters(text: &str) -> (String, usize) {
    let count = CONTROL_CHARS.find_iter(text).count();
    if count == 0 {
        return (text.to_string(), 0);
    }
    (CONTROL_CHARS.replace_all(text, "").into_owned(), count)
}

/// Keep only the first XML prolog and the first DOCTYPE declaration
pub fn remove_duplicate_declarations(text: &str) -> (String, usize) {
    let mut removed = 0;
    let mut result = text.to_string();

    for pattern in [&*PROLOG, &*DOCTYPE] {
        let mut seen = false;
        result = pattern
            .replace_all(&result, |caps: &Captures| {
                if seen {
                    removed += 1;
                    String::new()
                } else {
                    seen = true;
                    caps[0].to_string()
                }
            })
            .into_owned();
    }

    (result, removed)
}

/// Escape `&` characters that do not start a predefined or numeric entity
pub fn escape_stray_ampersands(text: &str) -> (String, usize) {
    let mut escaped = 0;
    let result = AMPERSAND.replace_all(text, |caps: &Captures| match caps.get(1) {
        Some(entity)
            if entity.as_str().starts_with('#')
                || PREDEFINED_ENTITIES.contains(&entity.as_str()) =>
        {
            caps[0].to_string()
        }
        other => {
            escaped += 1;
            format!("&amp;{}", other.map_or("", |m| m.as_str()))
        }
    });
    (result.into_owned(), escaped)
}

/// Close leaf elements whose text is followed by another tag instead of their end tag
pub fn close_leaf_elements(text: &str) -> (String, usize) {
    let mut result = String::with_capacity(text.len());
    let mut closed = 0;
    let mut cursor = 0;

    for caps in LEAF_OPEN.captures_iter(text) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() < cursor || whole.as_str().ends_with("/>") {
            continue;
        }

        let content_start = whole.end();
        let rest = &text[content_start..];
        let Some(next_tag) = rest.find('<') else {
            continue;
        };
        let following = &rest[next_tag..];

        if is_end_tag(following, name.as_str()) || following.starts_with("<![CDATA[") {
            continue;
        }

        result.push_str(&text[cursor..content_start + next_tag]);
        result.push_str("</");
        result.push_str(name.as_str());
        result.push('>');
        cursor = content_start + next_tag;
        closed += 1;
    }

    result.push_str(&text[cursor..]);
    (result, closed)
}

fn is_end_tag(tag: &str, name: &str) -> bool {
    tag.strip_prefix("</")
        .and_then(|rest| rest.strip_prefix(name))
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c == '>' || c.is_whitespace())
}

/// Drop everything after the end tag of the first root element
pub fn keep_first_root(text: &str) -> (String, bool) {
    let Some(root) = ROOT_START.captures(text).and_then(|caps| caps.get(1)) else {
        return (text.to_string(), false);
    };

    let end_tag = format!("</{}", root.as_str());
    let mut search_from = root.end();
    while let Some(offset) = text[search_from..].find(&end_tag) {
        let tag_start = search_from + offset;
        let after = &text[tag_start + end_tag.len()..];
        let trimmed = after.trim_start();
        if let Some(rest) = trimmed.strip_prefix('>') {
            if rest.trim().is_empty() {
                return (text.to_string(), false);
            }
            let end = text.len() - rest.len();
            return (text[..end].to_string(), true);
        }
        search_from = tag_start + end_tag.len();
    }

    (text.to_string(), false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_document_is_untouched() {
        let doc = r#"<?xml version="1.0"?>
<gpx version="1.1" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <trk><name>Ride &amp; Hike</name><trkseg>
    <trkpt lat="1.0" lon="2.0"><ele>3</ele><extensions><gpxtpx:hr>120</gpxtpx:hr></extensions></trkpt>
  </trkseg></trk>
</gpx>"#;
        let (repaired, repairs) = repair(doc, DEFAULT_NAMESPACES);
        assert!(repairs.is_empty(), "unexpected repairs: {repairs:?}");
        assert_eq!(repaired, doc);
    }

    #[test]
    fn test_declares_missing_known_namespace() {
        let doc = r#"<gpx version="1.1"><trk><trkseg><trkpt lat="1" lon="2"><extensions><gpxtpx:TrackPointExtension><gpxtpx:hr>90</gpxtpx:hr></gpxtpx:TrackPointExtension></extensions></trkpt></trkseg></trk></gpx>"#;
        let (repaired, declared) = declare_missing_namespaces(doc, DEFAULT_NAMESPACES);
        assert_eq!(declared, vec!["gpxtpx".to_string()]);
        assert!(repaired.starts_with(
            r#"<gpx xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1" version="1.1">"#
        ));
    }

    #[test]
    fn test_unknown_prefix_is_not_declared() {
        let doc = r#"<gpx><foo:bar>1</foo:bar></gpx>"#;
        let (repaired, declared) = declare_missing_namespaces(doc, DEFAULT_NAMESPACES);
        assert!(declared.is_empty());
        assert_eq!(repaired, doc);
    }

    #[test]
    fn test_strips_control_characters() {
        let (repaired, count) = strip_control_characters("<name>A\u{0001}B\u{0008}</name>");
        assert_eq!(repaired, "<name>AB</name>");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_removes_duplicate_prolog_and_doctype() {
        let doc = r#"<?xml version="1.0"?><!DOCTYPE gpx><?xml version="1.0"?><!DOCTYPE gpx><gpx/>"#;
        let (repaired, removed) = remove_duplicate_declarations(doc);
        assert_eq!(repaired, r#"<?xml version="1.0"?><!DOCTYPE gpx><gpx/>"#);
        assert_eq!(removed, 2);
    }

    #[test]
    fn test_escapes_stray_ampersands_only() {
        let (repaired, count) =
            escape_stray_ampersands("<name>Tom & Jerry &amp; &#38; &#x26; &nbsp;</name>");
        assert_eq!(
            repaired,
            "<name>Tom &amp; Jerry &amp; &#38; &#x26; &amp;nbsp;</name>"
        );
        assert_eq!(count, 2);
    }

    #[test]
    fn test_closes_unterminated_leaf_elements() {
        let doc = "<trkpt lat=\"1\" lon=\"2\"><ele>100\n<time>2024-01-01T00:00:00Z</time></trkpt>";
        let (repaired, closed) = close_leaf_elements(doc);
        assert_eq!(
            repaired,
            "<trkpt lat=\"1\" lon=\"2\"><ele>100\n</ele><time>2024-01-01T00:00:00Z</time></trkpt>"
        );
        assert_eq!(closed, 1);
    }

    #[test]
    fn test_self_closing_leaf_elements_are_left_alone() {
        let doc = "<trk><name>Loop</name><desc /><cmt/><trkseg><trkpt lat=\"1\" lon=\"2\"><name /><sym foo=\"x\" /></trkpt></trkseg></trk>";
        let (repaired, closed) = close_leaf_elements(doc);
        assert_eq!(repaired, doc);
        assert_eq!(closed, 0);
    }

    #[test]
    fn test_well_formed_document_with_empty_leaves_is_untouched() {
        let doc = r#"<gpx version="1.1">
  <wpt lat="10.0" lon="10.0"><name>Far Cafe</name></wpt>
  <trk><name>Loop</name><desc />
    <trkseg><trkpt lat="46.0" lon="8.0"><name /></trkpt><trkpt lat="46.01" lon="8.0"/></trkseg>
  </trk>
</gpx>"#;
        let (repaired, repairs) = repair(doc, DEFAULT_NAMESPACES);
        assert!(repairs.is_empty(), "unexpected repairs: {repairs:?}");
        assert_eq!(repaired, doc);
    }

    #[test]
    fn test_leaf_with_cdata_is_left_alone() {
        let doc = "<name><![CDATA[Loop]]></name>";
        let (repaired, closed) = close_leaf_elements(doc);
        assert_eq!(repaired, doc);
        assert_eq!(closed, 0);
    }

    #[test]
    fn test_keeps_only_first_root() {
        let doc = "<?xml version=\"1.0\"?><gpx><trk/></gpx>\n<gpx><trk/></gpx>";
        let (repaired, truncated) = keep_first_root(doc);
        assert!(truncated);
        assert_eq!(repaired, "<?xml version=\"1.0\"?><gpx><trk/></gpx>");
    }

    #[test]
    fn test_single_root_with_trailing_whitespace_is_kept() {
        let doc = "<gpx></gpx>\n\n";
        let (repaired, truncated) = keep_first_root(doc);
        assert!(!truncated);
        assert_eq!(repaired, doc);
    }
}
