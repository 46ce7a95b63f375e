//! Leaf collection and shape-preserving reassembly of batch inputs.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use common::FieldMap;

/// How a batch is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// `{field: value}`.
    Flat,
    /// `{row: {field: value}}`, nested to any depth.
    Row,
    /// `{column: {field: value}}`: the row shape, with the outer key
    /// naming a column instead of a row.
    Column,
}

impl BatchMode {
    /// The key scope used when the caller does not choose one.
    ///
    /// Every mode reads the field from the key directly holding the leaf.
    /// `{field: {row: value}}` input needs an explicit [`KeyScope::Outer`].
    pub fn default_scope(&self) -> KeyScope {
        KeyScope::Inner
    }
}

/// Which nesting level names the field a leaf belongs to.
///
/// The field drives both key resolution and the AAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    /// The key directly holding the leaf.
    Inner,
    /// The top-level key the leaf sits under.
    Outer,
}

/// What to do when a leaf fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort on the first failing leaf (in key order).
    FailFast,
    /// Return every successful leaf plus a map of failures.
    BestEffort,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(FailurePolicy::FailFast),
            "best-effort" => Ok(FailurePolicy::BestEffort),
            other => Err(format!("unknown failure policy {other:?}")),
        }
    }
}

/// One value to transform, with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub path: Vec<String>,
    pub field: String,
    pub value: Value,
}

impl Leaf {
    /// Dotted form of the path, used in error maps.
    ///
    /// `.` and `\` inside a segment are backslash-escaped, so `{"a.b": ..}`
    /// and `{"a": {"b": ..}}` never share a key.
    pub fn dotted(&self) -> String {
        self.path
            .iter()
            .map(|seg| seg.replace('\\', "\\\\").replace('.', "\\."))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Flatten `batch` into leaves in key order.
///
/// Objects are descended into; every other value (including arrays) is a
/// leaf. The leaf's field is chosen by `scope`.
pub fn collect(batch: &FieldMap, scope: KeyScope) -> Vec<Leaf> {
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(batch, scope, &mut path, &mut out);
    out
}

fn walk(map: &FieldMap, scope: KeyScope, path: &mut Vec<String>, out: &mut Vec<Leaf>) {
    for (key, value) in map {
        path.push(key.clone());
        match value {
            Value::Object(inner) => walk(inner, scope, path, out),
            leaf => {
                let field = match scope {
                    KeyScope::Inner => key.clone(),
                    KeyScope::Outer => path[0].clone(),
                };
                out.push(Leaf {
                    path: path.clone(),
                    field,
                    value: leaf.clone(),
                });
            }
        }
        path.pop();
    }
}

/// Rebuild `batch` with each leaf replaced by its entry in `results`.
///
/// Leaves with no entry are dropped; objects are kept even when emptied.
pub fn rebuild(batch: &FieldMap, results: &mut HashMap<Vec<String>, Value>) -> FieldMap {
    let mut path = Vec::new();
    rebuild_map(batch, &mut path, results)
}

fn rebuild_map(map: &FieldMap, path: &mut Vec<String>, results: &mut HashMap<Vec<String>, Value>) -> FieldMap {
    let mut out = FieldMap::new();
    for (key, value) in map {
        path.push(key.clone());
        match value {
            Value::Object(inner) => {
                out.insert(key.clone(), Value::Object(rebuild_map(inner, path, results)));
            }
            _ => {
                if let Some(v) = results.remove(path.as_slice()) {
                    out.insert(key.clone(), v);
                }
            }
        }
        path.pop();
    }
    out
}
