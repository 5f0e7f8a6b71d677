//! Change detection that ignores UI-only payload keys

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Edge, Node, Payload};

/// Version of the built-in deny-list.
pub const TRANSIENT_FIELDS_VERSION: u32 = 1;

/// Payload keys that exist only for the live editing session (hover
/// highlights and the like) and must never mark an entity dirty.
///
/// The list is versioned: snapshots record the version they were written
/// with, so a reader can tell when the deny-list changed underneath a
/// stream of deltas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientFields {
    pub version: u32,
    pub keys: BTreeSet<String>,
}

impl TransientFields {
    pub fn new<I, S>(version: u32, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TransientFields {
            version,
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// An empty deny-list: every payload key participates in comparison.
    pub fn none() -> Self {
        TransientFields {
            version: 0,
            keys: BTreeSet::new(),
        }
    }

    /// Extend the deny-list under a new version number.
    pub fn extended(mut self, version: u32, key: impl Into<String>) -> Self {
        self.version = version;
        self.keys.insert(key.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Copy of `payload` without transient keys.
    pub fn strip(&self, payload: &Payload) -> Payload {
        payload
            .iter()
            .filter(|(key, _)| !self.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

impl Default for TransientFields {
    fn default() -> Self {
        Self::new(TRANSIENT_FIELDS_VERSION, ["isHighlighted", "isHovered"])
    }
}

/// Deep equality of two payloads, skipping transient keys on both sides.
pub fn payload_eq(a: &Payload, b: &Payload, transient: &TransientFields) -> bool {
    let persistent = |payload: &Payload| {
        payload
            .iter()
            .filter(|(key, _)| !transient.contains(key))
            .count()
    };

    if persistent(a) != persistent(b) {
        return false;
    }

    a.iter()
        .filter(|(key, _)| !transient.contains(key))
        .all(|(key, value)| b.get(key).is_some_and(|other| value_eq(value, other)))
}

/// Structural JSON equality where numbers compare by value, so `1` and
/// `1.0` are the same at any depth.
fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y || matches!((x.as_f64(), y.as_f64()), (Some(x), Some(y)) if x == y)
        }
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| value_eq(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| value_eq(x, y)))
        }
        _ => a == b,
    }
}

/// Whether `next` differs meaningfully from `previous`.
///
/// Checked in order: position, dimensions (when either side has them),
/// parent boundary, then payload without transient keys.
pub fn node_changed(previous: &Node, next: &Node, transient: &TransientFields) -> bool {
    if previous.position != next.position {
        return true;
    }

    if (previous.dimensions.is_some() || next.dimensions.is_some())
        && previous.dimensions != next.dimensions
    {
        return true;
    }

    if previous.parent_id != next.parent_id {
        return true;
    }

    !payload_eq(&previous.data, &next.data, transient)
}

/// Edge counterpart of [`node_changed`]: endpoints, style, then payload.
pub fn edge_changed(previous: &Edge, next: &Edge, transient: &TransientFields) -> bool {
    previous.source != next.source
        || previous.target != next.target
        || previous.kind != next.kind
        || !payload_eq(&previous.data, &next.data, transient)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_nodes_are_unchanged() {
        let node = Node::device("a", 10.0, 20.0).with_data("label", "fw-1");
        assert!(!node_changed(&node, &node.clone(), &TransientFields::default()));
    }

    #[test]
    fn test_position_change_detected() {
        let node = Node::device("a", 0.0, 0.0);
        let moved = node.moved_to(0.0, 0.5);
        assert!(node_changed(&node, &moved, &TransientFields::default()));
    }

    #[test]
    fn test_dimensions_compared_when_either_side_has_them() {
        let plain = Node::boundary("b", 0.0, 0.0);
        let measured = plain.clone().with_dimensions(200.0, 100.0);
        let transient = TransientFields::default();

        assert!(node_changed(&plain, &measured, &transient));
        assert!(node_changed(&measured, &plain, &transient));
        assert!(!node_changed(&plain, &plain.clone(), &transient));
    }

    #[test]
    fn test_parent_change_detected() {
        let orphan = Node::device("a", 0.0, 0.0);
        let nested = orphan.clone().with_parent("zone-1");
        assert!(node_changed(&orphan, &nested, &TransientFields::default()));
    }

    #[test]
    fn test_transient_keys_ignored() {
        let node = Node::device("a", 0.0, 0.0).with_data("label", "db");
        let hovered = node.clone().with_data("isHovered", true);
        let transient = TransientFields::default();

        assert!(!node_changed(&node, &hovered, &transient));
        assert!(node_changed(&node, &hovered, &TransientFields::none()));
    }

    #[test]
    fn test_nested_payload_compared_deeply() {
        let a = Node::device("a", 0.0, 0.0).with_data("ports", json!([{"n": 22}]));
        let b = Node::device("a", 0.0, 0.0).with_data("ports", json!([{"n": 443}]));
        assert!(node_changed(&a, &b, &TransientFields::default()));
    }

    #[test]
    fn test_comparison_does_not_mutate_inputs() {
        let a = Node::device("a", 0.0, 0.0).with_data("isHighlighted", true);
        let b = Node::device("a", 0.0, 0.0);
        let (a_before, b_before) = (a.clone(), b.clone());

        node_changed(&a, &b, &TransientFields::default());
        assert_eq!(a, a_before);
        assert_eq!(b, b_before);
    }

    #[test]
    fn test_edge_changes() {
        let edge = Edge::new("e1", "a", "b");
        let transient = TransientFields::default();

        assert!(!edge_changed(&edge, &edge.clone(), &transient));
        assert!(edge_changed(&edge, &Edge::new("e1", "a", "c"), &transient));
        assert!(edge_changed(&edge, &edge.clone().with_kind("smoothstep"), &transient));
        assert!(!edge_changed(
            &edge,
            &edge.clone().with_data("isHighlighted", true),
            &transient
        ));
    }

    #[test]
    fn test_extended_deny_list() {
        let transient = TransientFields::default().extended(2, "isSelected");
        assert_eq!(transient.version, 2);
        assert!(transient.contains("isSelected"));
        assert!(transient.contains("isHovered"));

        let payload = Node::device("a", 0.0, 0.0)
            .with_data("isSelected", true)
            .with_data("label", "x")
            .data;
        let stripped = transient.strip(&payload);
        assert_eq!(stripped.len(), 1);
        assert!(stripped.contains_key("label"));
    }

    #[test]
    fn test_numbers_compare_by_value() {
        let transient = TransientFields::default();
        let base = Node::device("a", 0.0, 0.0).with_data("w", json!(1));

        assert!(!node_changed(&base, &base.clone().with_data("w", json!(1.0)), &transient));
        assert!(!node_changed(
            &base.clone().with_data("ports", json!([{ "vlan": 10 }])),
            &base.clone().with_data("ports", json!([{ "vlan": 10.0 }])),
            &transient
        ));
        assert!(node_changed(&base, &base.clone().with_data("w", json!(1.5)), &transient));
        assert!(node_changed(&base, &base.clone().with_data("w", json!("1")), &transient));
    }
}
