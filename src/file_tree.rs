// src/file_tree.rs

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure while normalizing or applying a model-produced file tree.
#[derive(Debug, Error)]
pub enum SyncApplyError {
    #[error("file tree entry {path:?} does not match the declared shape")]
    Shape { path: String },
}

/// The shape the model is instructed to produce.
#[derive(Deserialize)]
struct StrictNode {
    file: StrictFile,
}

#[derive(Deserialize)]
struct StrictFile {
    contents: String,
}

/// Decode a file tree that actually honors the declared
/// `{path: {file: {contents}}}` contract. The first entry that does not is
/// reported by path; recovery is the caller's explicit next step.
pub fn decode_strict(tree: &Map<String, Value>) -> Result<BTreeMap<String, String>, SyncApplyError> {
    let mut out = BTreeMap::new();
    for (path, node) in tree {
        let node: StrictNode = serde_json::from_value(node.clone())
            .map_err(|_| SyncApplyError::Shape { path: path.clone() })?;
        out.insert(path.clone(), node.file.contents);
    }
    Ok(out)
}

/// Best-effort recovery for trees that drifted from the contract. Candidate
/// fields are probed in a fixed priority order; an entry with nothing usable
/// still lands in the tree with empty content.
pub fn decode_lenient(tree: &Map<String, Value>) -> BTreeMap<String, String> {
    tree.iter()
        .map(|(path, node)| (path.clone(), lenient_content(node)))
        .collect()
}

fn lenient_content(node: &Value) -> String {
    if let Some(s) = node.as_str() {
        return s.to_string();
    }
    let Some(obj) = node.as_object() else {
        return String::new();
    };
    let candidates = [
        obj.get("file").and_then(|f| f.get("contents")),
        obj.get("file").and_then(|f| f.get("content")),
        obj.get("contents"),
        obj.get("content"),
    ];
    for candidate in candidates {
        if let Some(s) = candidate.and_then(Value::as_str) {
            return s.to_string();
        }
    }
    obj.values()
        .find_map(Value::as_str)
        .map(|s| s.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(raw: &str) -> Map<String, Value> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn strict_accepts_the_declared_shape() {
        let t = tree(r#"{"app.js":{"file":{"contents":"hello"}}}"#);
        let out = decode_strict(&t).unwrap();
        assert_eq!(out["app.js"], "hello");
    }

    #[test]
    fn strict_rejects_drifted_shapes_by_path() {
        let t = tree(r#"{"app.js":{"file":{"content":"hello"}}}"#);
        match decode_strict(&t) {
            Err(SyncApplyError::Shape { path }) => assert_eq!(path, "app.js"),
            other => panic!("expected shape error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn lenient_probes_in_priority_order() {
        let t = tree(
            r#"{
            "a": {"file":{"contents":"from file.contents","content":"x"}},
            "b": {"file":{"content":"from file.content"}},
            "c": {"contents":"from contents"},
            "d": {"content":"from content"},
            "e": "bare string",
            "f": {"whatever":"first string prop"},
            "g": {"nothing":42}
        }"#,
        );
        let out = decode_lenient(&t);
        assert_eq!(out["a"], "from file.contents");
        assert_eq!(out["b"], "from file.content");
        assert_eq!(out["c"], "from contents");
        assert_eq!(out["d"], "from content");
        assert_eq!(out["e"], "bare string");
        assert_eq!(out["f"], "first string prop");
        assert_eq!(out["g"], "");
    }

    #[test]
    fn lenient_keeps_every_path() {
        let t = tree(r#"{"broken": null, "ok": {"file":{"contents":"x"}}}"#);
        let out = decode_lenient(&t);
        assert_eq!(out.len(), 2);
        assert_eq!(out["broken"], "");
        assert_eq!(out["ok"], "x");
    }
}
