//! JSON body helpers for instance-level linking
//!
//! Field paths are dot-separated keys into a resource body. Arrays are
//! traversed transparently at any segment, so `backends.group` matches
//! `{"backends": [{"group": "..."}, {"group": "..."}]}`.

use super::endpoint::QUERY_SEPARATOR;
use serde_json::Value;
use std::collections::BTreeSet;

fn walk<'a>(current: &'a Value, parts: &[&str], out: &mut Vec<&'a Value>) {
    match current {
        Value::Array(items) => {
            for item in items {
                walk(item, parts, out);
            }
        },
        _ => match parts.split_first() {
            None => out.push(current),
            Some((head, rest)) => {
                if let Some(next) = current.get(*head) {
                    walk(next, rest, out);
                }
            },
        },
    }
}

/// Every leaf reached by `path`, arrays flattened
pub fn field_leaves<'a>(body: &'a Value, path: &str) -> Vec<&'a Value> {
    let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
    let mut out = Vec::new();
    if parts.is_empty() {
        return out;
    }
    walk(body, &parts, &mut out);
    out
}

/// Non-empty string values reachable at `path`
pub fn field_values(body: &Value, path: &str) -> Vec<String> {
    field_leaves(body, path)
        .into_iter()
        .filter_map(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Every dotted path present in `body`, arrays flattened
pub fn collect_paths(body: &Value) -> BTreeSet<String> {
    fn visit(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    out.insert(path.clone());
                    visit(child, &path, out);
                }
            },
            Value::Array(items) => {
                for item in items {
                    visit(item, prefix, out);
                }
            },
            _ => {},
        }
    }

    let mut out = BTreeSet::new();
    visit(body, "", &mut out);
    out
}

fn path_segments(value: &str) -> Vec<&str> {
    let without_scheme = value
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').map(|(_, path)| path).unwrap_or(""))
        .unwrap_or(value);
    let without_query = without_scheme.split(['?', '#']).next().unwrap_or("");
    without_query.split('/').filter(|s| !s.is_empty()).collect()
}

/// Segment following each of `keys`, matched in order
///
/// `("projects/p/locations/us/keyRings/a", ["locations", "keyRings"])`
/// gives `["us", "a"]`.
pub fn segments_after_keys(path: &str, keys: &[&str]) -> Option<Vec<String>> {
    if keys.is_empty() {
        return None;
    }

    let segments = path_segments(path);
    let mut found = Vec::with_capacity(keys.len());
    let mut cursor = 0;

    for key in keys {
        let offset = segments[cursor..].iter().position(|s| s == key)?;
        let value = segments.get(cursor + offset + 1)?;
        found.push(value.to_string());
        cursor += offset + 2;
    }

    Some(found)
}

/// Turn a referenced value into a composite query with `slots` parts
///
/// Self-links and relative names alternate `collection/value`, so the parts
/// are every other segment counted back from the end:
/// `projects/p/locations/us/keyRings/a` with two slots gives `us|a`.
pub fn reference_query(value: &str, slots: usize) -> Option<String> {
    if slots == 0 {
        return None;
    }

    let segments = path_segments(value);
    let needed = 2 * slots - 1;
    if segments.len() < needed {
        return None;
    }

    let parts: Vec<&str> = segments
        .iter()
        .rev()
        .step_by(2)
        .take(slots)
        .copied()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    Some(parts.join(&QUERY_SEPARATOR.to_string()))
}
