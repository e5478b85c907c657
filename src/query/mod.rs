//! Query Engine
//!
//! Projects a sub-value out of a stored payload. Stored values are opaque
//! strings; they are only interpreted here, and only when a query is given.
//!
//! Untrusted input is bounded on both sides: queries by [`MAX_QUERY_LENGTH`]
//! and [`MAX_SEGMENTS`], documents by [`MAX_DOCUMENT_DEPTH`], which is checked
//! by a byte scan before anything is allocated for the parse.

mod path;

use serde_json::Value;
use tracing::debug;

use crate::cache::CacheEntry;

pub use path::{PathError, QueryPath, Segment, MAX_QUERY_LENGTH, MAX_SEGMENTS};

/// Deepest object/array nesting a document may have to be queryable
pub const MAX_DOCUMENT_DEPTH: usize = 64;

// == Projection ==
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// The path resolved to this sub-value
    Found(Value),
    /// The value is structured but the path does not resolve in it
    Miss,
    /// The value is not structured data
    NotApplicable,
}

// == Project ==
/// Evaluates `query` against the entry's value.
///
/// A query that fails to parse cannot address anything and is reported as
/// [`Projection::Miss`].
pub fn project(entry: &CacheEntry, query: &str) -> Projection {
    let Some(document) = entry.document() else {
        return Projection::NotApplicable;
    };

    let path = match query.parse::<QueryPath>() {
        Ok(path) => path,
        Err(err) => {
            debug!("Rejected query {:?}: {}", query, err);
            return Projection::Miss;
        }
    };

    match resolve(document, &path) {
        Some(found) => Projection::Found(found.clone()),
        None => Projection::Miss,
    }
}

/// Walks `path` through `document`.
///
/// Fields address object members; on arrays a field made of digits is read
/// as an index, and on objects an index is read as the member of that name.
pub fn resolve<'a>(document: &'a Value, path: &QueryPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(document, |current, segment| match (current, segment) {
            (Value::Object(map), Segment::Field(name)) => map.get(name),
            (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
            (Value::Array(items), Segment::Index(index)) => items.get(*index),
            (Value::Array(items), Segment::Field(name)) => name
                .parse::<usize>()
                .ok()
                .and_then(|index| items.get(index)),
            _ => None,
        })
}

// == Parse Document ==
/// Parses `raw` as a structured document.
///
/// Only JSON objects and arrays count as structured; scalars, invalid JSON
/// and documents nested deeper than [`MAX_DOCUMENT_DEPTH`] yield `None`.
pub fn parse_document(raw: &str) -> Option<Value> {
    let trimmed = raw.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    if nesting_depth(trimmed) > MAX_DOCUMENT_DEPTH {
        debug!("Document nesting exceeds {} levels", MAX_DOCUMENT_DEPTH);
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Maximum bracket nesting in `raw`, ignoring brackets inside strings.
///
/// Runs in constant space so a hostile payload cannot blow the stack or
/// the heap before it is rejected.
fn nesting_depth(raw: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in raw.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    deepest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PersistenceMode;
    use serde_json::json;

    fn entry(raw: &str) -> CacheEntry {
        CacheEntry::new(raw, 60, PersistenceMode::None)
    }

    #[test]
    fn test_project_nested_field() {
        let stored = entry(r#"{"a":{"b":42}}"#);
        assert_eq!(project(&stored, "a.b"), Projection::Found(json!(42)));
        assert_eq!(project(&stored, "a"), Projection::Found(json!({"b": 42})));
    }

    #[test]
    fn test_project_missing_field() {
        let stored = entry(r#"{"a":{"b":42}}"#);
        assert_eq!(project(&stored, "a.c"), Projection::Miss);
        assert_eq!(project(&stored, "a.b.c"), Projection::Miss);
    }

    #[test]
    fn test_project_unstructured_value() {
        assert_eq!(project(&entry("hello"), "a"), Projection::NotApplicable);
        assert_eq!(project(&entry("42"), "a"), Projection::NotApplicable);
        assert_eq!(project(&entry("{not json"), "a"), Projection::NotApplicable);
    }

    #[test]
    fn test_project_arrays() {
        let stored = entry(r#"{"comments":[{"user":"ann"},{"user":"bob"}]}"#);
        assert_eq!(
            project(&stored, "comments[1].user"),
            Projection::Found(json!("bob"))
        );
        assert_eq!(
            project(&stored, "comments.0.user"),
            Projection::Found(json!("ann"))
        );
        assert_eq!(project(&stored, "comments[2]"), Projection::Miss);
    }

    #[test]
    fn test_project_root() {
        let stored = entry("[1,2,3]");
        assert_eq!(project(&stored, "$"), Projection::Found(json!([1, 2, 3])));
    }

    #[test]
    fn test_malformed_query_is_miss() {
        let stored = entry(r#"{"a":1}"#);
        assert_eq!(project(&stored, "a..b"), Projection::Miss);
        assert_eq!(project(&stored, "[unterminated"), Projection::Miss);
    }

    #[test]
    fn test_numeric_member_names() {
        let stored = entry(r#"{"2024":{"total":5}}"#);
        assert_eq!(
            project(&stored, "[2024].total"),
            Projection::Found(json!(5))
        );
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let deep = format!(
            "{}{}",
            "[".repeat(MAX_DOCUMENT_DEPTH + 1),
            "]".repeat(MAX_DOCUMENT_DEPTH + 1)
        );
        assert!(parse_document(&deep).is_none());

        let ok = format!(
            "{}{}",
            "[".repeat(MAX_DOCUMENT_DEPTH),
            "]".repeat(MAX_DOCUMENT_DEPTH)
        );
        assert!(parse_document(&ok).is_some());
    }

    #[test]
    fn test_brackets_inside_strings_ignored() {
        let raw = format!(r#"{{"s":"{}"}}"#, "[".repeat(500));
        assert_eq!(nesting_depth(&raw), 1);
        assert!(parse_document(&raw).is_some());
    }

    #[test]
    fn test_escaped_quotes_in_strings() {
        assert_eq!(nesting_depth(r#"{"a":"\"[[[","b":[1]}"#), 2);
    }
}
