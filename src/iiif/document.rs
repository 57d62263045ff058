// src/iiif/document.rs
// =============================================================================
// Turns one fetched JSON body into a typed CollectionDocument.
//
// The IIIF Presentation API has two incompatible generations:
// - v2: "@context" mentions presentation/2, ids live under "@id", children
//       are split across "collections" and "manifests" keys, and pagination
//       uses "first" (on the sequence root) and "next" (on each page)
// - v3: "@context" mentions presentation/3, ids live under "id", children
//       sit in one "items" array with a per-item "type", and pagination is
//       an items entry whose label reads "next page"
//
// Everything downstream pattern-matches on the CollectionDocument produced
// here instead of probing raw JSON, so the two shapes are handled in exactly
// one place.
// =============================================================================

use serde_json::Value;
use tracing::warn;

/// Which generation of the Presentation API a document speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IiifVersion {
    V2,
    V3,
}

/// What a child reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Manifest,
    Collection,
    /// Present in the document but with a type we don't recognize
    Unknown,
}

/// One child reference inside a collection, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub id: String,
    pub kind: ItemKind,
}

/// A classified IIIF collection document.
///
/// Built fresh from every fetched body (cache hit or miss), never mutated,
/// and discarded once the traversal has drained its children and next page.
#[derive(Debug, Clone)]
pub struct CollectionDocument {
    /// Canonical id of this resource (falls back to the requested URL)
    pub id: String,
    pub version: IiifVersion,
    /// Child manifests/collections, pagination markers excluded
    pub child_refs: Vec<ItemRef>,
    /// URL of the next page of this same logical collection, if any
    pub next_page: Option<String>,
}

impl CollectionDocument {
    /// Classifies a fetched JSON value.
    ///
    /// Returns None when the document matches neither IIIF generation; the
    /// traversal records that as a skip, not an error.
    pub fn from_json(requested_url: &str, json: &Value) -> Option<CollectionDocument> {
        let version = detect_version(json)?;

        let id = json
            .get("id")
            .or_else(|| json.get("@id"))
            .and_then(Value::as_str)
            .unwrap_or(requested_url)
            .to_string();

        let (child_refs, next_page) = match version {
            IiifVersion::V2 => parse_v2(requested_url, json),
            IiifVersion::V3 => parse_v3(requested_url, json),
        };

        Some(CollectionDocument {
            id,
            version,
            child_refs,
            next_page,
        })
    }
}

/// Detects which Presentation API generation a document speaks.
///
/// The "@context" URI is authoritative when present. Without it we fall
/// back to the key-naming convention: v3 resources carry a bare "type",
/// v2 resources carry "@type".
pub(crate) fn detect_version(json: &Value) -> Option<IiifVersion> {
    if let Some(context) = json.get("@context") {
        // @context may be a single URI or an array of them
        let uris: Vec<&str> = match context {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => vec![],
        };
        for uri in uris {
            if uri.contains("/presentation/3") {
                return Some(IiifVersion::V3);
            }
            if uri.contains("/presentation/2") {
                return Some(IiifVersion::V2);
            }
        }
    }

    match (json.get("type"), json.get("@type")) {
        (Some(Value::String(t)), _) if t == "Collection" || t == "Manifest" => {
            Some(IiifVersion::V3)
        }
        (_, Some(Value::String(t))) if t.starts_with("sc:") => Some(IiifVersion::V2),
        _ => None,
    }
}

// v2: children under "collections" and "manifests"; pagination via
// "first" (root only) and "next"
fn parse_v2(requested_url: &str, json: &Value) -> (Vec<ItemRef>, Option<String>) {
    let mut refs = Vec::new();

    for (key, kind) in [
        ("collections", ItemKind::Collection),
        ("manifests", ItemKind::Manifest),
    ] {
        if let Some(items) = json.get(key).and_then(Value::as_array) {
            for item in items {
                match ref_id(item) {
                    Some(id) => refs.push(ItemRef { id, kind }),
                    None => warn!(collection = requested_url, "item without an id, skipping"),
                }
            }
        }
    }

    // "first" is a root-only entry point into a paged sequence; pages of
    // the sequence (anything carrying "within" or "prev") only follow
    // their own "next", so first is never re-surfaced mid-pagination
    let is_page = json.get("within").is_some() || json.get("prev").is_some();
    let next_page = json
        .get("next")
        .and_then(ref_id)
        .or_else(|| {
            if is_page {
                None
            } else {
                json.get("first").and_then(ref_id)
            }
        });

    (refs, next_page)
}

// v3: one "items" array; per-item "type" decides the kind, and an item
// labelled "next page" is the pagination continuation, not a child
fn parse_v3(requested_url: &str, json: &Value) -> (Vec<ItemRef>, Option<String>) {
    let mut refs = Vec::new();
    let mut next_page = None;

    if let Some(items) = json.get("items").and_then(Value::as_array) {
        for item in items {
            let id = match ref_id(item) {
                Some(id) => id,
                None => {
                    warn!(collection = requested_url, "item without an id, skipping");
                    continue;
                }
            };

            if is_next_page_marker(item) {
                // First marker wins; a well-formed page carries only one
                if next_page.is_none() {
                    next_page = Some(id);
                }
                continue;
            }

            let kind = match normalized_type(item).as_deref() {
                Some(t) if t.contains("manifest") => ItemKind::Manifest,
                Some(t) if t.contains("collection") => ItemKind::Collection,
                _ => ItemKind::Unknown,
            };
            refs.push(ItemRef { id, kind });
        }
    }

    (refs, next_page)
}

// Extracts an identifier from a reference, which may be a bare string or
// an object keyed by "id" (v3) or "@id" (v2)
fn ref_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("@id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

// Normalizes an item's type the way servers actually serve it: "type" or
// "@type", possibly an array, possibly namespaced ("sc:Manifest")
fn normalized_type(item: &Value) -> Option<String> {
    let raw = item.get("type").or_else(|| item.get("@type"))?;
    let s = match raw {
        Value::String(s) => s.as_str(),
        Value::Array(items) => items.first()?.as_str()?,
        _ => return None,
    };
    Some(s.rsplit(':').next().unwrap_or(s).to_ascii_lowercase())
}

// A v3 pagination marker is an items entry whose human-readable label
// equals "next page", case-insensitively. v3 labels are language maps
// ({"en": ["next page"]}), but some servers serve plain strings.
fn is_next_page_marker(item: &Value) -> bool {
    let Some(label) = item.get("label") else {
        return false;
    };
    label_texts(label)
        .iter()
        .any(|text| text.eq_ignore_ascii_case("next page"))
}

fn label_texts(label: &Value) -> Vec<String> {
    match label {
        Value::String(s) => vec![s.clone()],
        Value::Object(map) => map
            .values()
            .flat_map(|v| match v {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => vec![],
            })
            .collect(),
        _ => vec![],
    }
}
