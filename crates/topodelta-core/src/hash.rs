//! Content hash over the canonical diagram state

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::compare::TransientFields;
use crate::model::{Edge, Node};

/// BLAKE3 digest of a canonicalized node/edge set.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateHash([u8; 32]);

impl StateHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }
}

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateHash({})", self.to_hex())
    }
}

impl FromStr for StateHash {
    type Err = blake3::HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        blake3::Hash::from_hex(s).map(|hash| StateHash(*hash.as_bytes()))
    }
}

impl Serialize for StateHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for StateHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash nodes and edges independent of their order, ignoring transient
/// payload keys.
pub fn state_hash<'a>(
    nodes: impl IntoIterator<Item = &'a Node>,
    edges: impl IntoIterator<Item = &'a Edge>,
    transient: &TransientFields,
) -> StateHash {
    let mut nodes: Vec<&Node> = nodes.into_iter().collect();
    let mut edges: Vec<&Edge> = edges.into_iter().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    edges.sort_by(|a, b| a.id.cmp(&b.id));

    let mut hasher = blake3::Hasher::new();
    hasher.update(b"nodes");
    for node in nodes {
        field(&mut hasher, node.id.as_bytes());
        field(&mut hasher, node.kind.as_str().as_bytes());
        hasher.update(&node.position.x.to_bits().to_le_bytes());
        hasher.update(&node.position.y.to_bits().to_le_bytes());
        match node.dimensions {
            Some(dims) => {
                hasher.update(&[1]);
                hasher.update(&dims.width.to_bits().to_le_bytes());
                hasher.update(&dims.height.to_bits().to_le_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        field(&mut hasher, node.parent_id.as_deref().unwrap_or("").as_bytes());
        let data = serde_json::Value::Object(transient.strip(&node.data));
        field(&mut hasher, data.to_string().as_bytes());
    }

    hasher.update(b"edges");
    for edge in edges {
        field(&mut hasher, edge.id.as_bytes());
        field(&mut hasher, edge.source.as_bytes());
        field(&mut hasher, edge.target.as_bytes());
        field(&mut hasher, edge.kind.as_bytes());
        let data = serde_json::Value::Object(transient.strip(&edge.data));
        field(&mut hasher, data.to_string().as_bytes());
    }

    StateHash(*hasher.finalize().as_bytes())
}

/// Length-prefixed so adjacent fields cannot run together.
fn field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_independent() {
        let a = Node::device("a", 0.0, 0.0);
        let b = Node::boundary("b", 5.0, 5.0).with_dimensions(100.0, 80.0);
        let t = TransientFields::default();

        assert_eq!(
            state_hash([&a, &b], [], &t),
            state_hash([&b, &a], [], &t)
        );
    }

    #[test]
    fn test_transient_keys_do_not_affect_hash() {
        let plain = Node::device("a", 0.0, 0.0);
        let hovered = plain.clone().with_data("isHovered", true);
        let t = TransientFields::default();

        assert_eq!(state_hash([&plain], [], &t), state_hash([&hovered], [], &t));
    }

    #[test]
    fn test_meaningful_change_alters_hash() {
        let node = Node::device("a", 0.0, 0.0);
        let edge = Edge::new("e", "a", "a");
        let t = TransientFields::default();

        let before = state_hash([&node], [&edge], &t);
        assert_ne!(before, state_hash([&node.moved_to(1.0, 0.0)], [&edge], &t));
        assert_ne!(before, state_hash([&node], [], &t));
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = state_hash([], [], &TransientFields::default());
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json.len(), 66);

        let parsed: StateHash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hash);
    }
}
