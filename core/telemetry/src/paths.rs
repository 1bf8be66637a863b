// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

// Helpers for building and printing gNMI paths. The parse tree operates on
// the wire `Path`/`PathElem` types directly; these helpers keep the schema
// builders and tests readable.

use std::collections::HashMap;

use gneiss_proto::api::gnmi::{Path, PathElem};

/// Wildcard key value selecting every instance under a keyed node.
pub const WILDCARD: &str = "*";

/// Path element standing for the entire subtree below its parent.
pub const SUBTREE: &str = "...";

/// Incrementally builds a `Path`, one element per call.
///
/// ```
/// use gneiss_telemetry::paths::PathBuilder;
/// let path = PathBuilder::new()
///     .elem("interfaces")
///     .keyed_elem("interface", "name", "eth0")
///     .elem("state")
///     .elem("oper-status")
///     .build();
/// assert_eq!(path.elem.len(), 4);
/// ```
#[derive(Debug, Default, Clone)]
pub struct PathBuilder {
    elems: Vec<PathElem>,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elem(mut self, name: &str) -> Self {
        self.elems.push(PathElem {
            name: name.to_string(),
            key: HashMap::new(),
        });
        self
    }

    pub fn keyed_elem(mut self, name: &str, key_name: &str, key_value: &str) -> Self {
        let mut key = HashMap::new();
        key.insert(key_name.to_string(), key_value.to_string());
        self.elems.push(PathElem {
            name: name.to_string(),
            key,
        });
        self
    }

    pub fn build(self) -> Path {
        Path {
            elem: self.elems,
            ..Default::default()
        }
    }
}

/// Render a path in the conventional `/a/b[name=x]/c` form for logs and
/// error messages.
pub fn path_to_string(path: &Path) -> String {
    let mut out = String::new();
    for elem in &path.elem {
        out.push('/');
        out.push_str(&elem.name);
        let mut keys: Vec<_> = elem.key.iter().collect();
        keys.sort();
        for (k, v) in keys {
            out.push_str(&format!("[{}={}]", k, v));
        }
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_render() {
        let path = PathBuilder::new()
            .elem("interfaces")
            .keyed_elem("interface", "name", WILDCARD)
            .elem("state")
            .build();
        assert_eq!(path.elem.len(), 3);
        assert_eq!(path.elem[1].key.get("name").unwrap(), "*");
        assert_eq!(
            path_to_string(&path),
            "/interfaces/interface[name=*]/state"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(path_to_string(&Path::default()), "/");
    }
}
