//! sovereign_coherence
//!
//! Routes `Packet` values to filesystem paths via a `Schema`, and infers a
//! `Schema` back from a corpus of previously-routed paths. Generalizes the
//! teacher workspace's path-sanitization discipline (`pieBot_common`'s
//! segment allowlist) to a full routing/derivation contract.

mod schema;

pub use schema::{derive as derive_schema, GroupKind, Schema, SchemaPart, SchemaSegment};

use serde::{Deserialize, Serialize};
use sovereign_common::{atomic_write, sanitize_segment, RootContext};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoherenceError {
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("packet is missing key referenced by schema: {0}")]
    InvalidPacket(String),
    #[error("segment is unsafe after sanitization: {0}")]
    UnsafePathSegment(String),
    #[error("io error")]
    Io(#[from] std::io::Error),
    #[error("json error")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PacketValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl PacketValue {
    fn render(&self) -> String {
        match self {
            PacketValue::Str(s) => s.clone(),
            PacketValue::Num(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            PacketValue::Bool(b) => b.to_string(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            PacketValue::Num(n) => Some(*n),
            PacketValue::Str(s) => s.parse().ok(),
            PacketValue::Bool(_) => None,
        }
    }
}

pub type Packet = BTreeMap<String, PacketValue>;

fn compute_decile(n: f64) -> String {
    let d = (n as i64).div_euclid(10);
    format!("{}-{}", d * 10, d * 10 + 9)
}

fn compute_hex_prefix(value: &PacketValue, len: usize) -> String {
    let digest = sovereign_common::sha256_bytes(value.render().as_bytes());
    let hex = digest.strip_prefix("sha256:").unwrap_or(&digest);
    hex.chars().take(len).collect()
}

fn render_part(part: &SchemaPart, packet: &Packet) -> Result<String, CoherenceError> {
    match part {
        SchemaPart::Literal(s) => Ok(s.clone()),
        SchemaPart::Key(key) => {
            let value = packet
                .get(key)
                .ok_or_else(|| CoherenceError::InvalidPacket(key.clone()))?;
            sanitize_segment(&value.render()).ok_or_else(|| CoherenceError::UnsafePathSegment(key.clone()))
        }
        SchemaPart::Group(group) => match group {
            GroupKind::Decile(key) => {
                let value = packet
                    .get(key)
                    .ok_or_else(|| CoherenceError::InvalidPacket(key.clone()))?;
                let n = value
                    .as_f64()
                    .ok_or_else(|| CoherenceError::InvalidPacket(format!("{key} is not numeric")))?;
                Ok(compute_decile(n))
            }
            GroupKind::HexPrefix(key, len) => {
                let value = packet
                    .get(key)
                    .ok_or_else(|| CoherenceError::InvalidPacket(key.clone()))?;
                Ok(compute_hex_prefix(value, *len))
            }
            GroupKind::Enum(key) => {
                let value = packet
                    .get(key)
                    .ok_or_else(|| CoherenceError::InvalidPacket(key.clone()))?;
                sanitize_segment(&value.render()).ok_or_else(|| CoherenceError::UnsafePathSegment(key.clone()))
            }
        },
    }
}

fn render_segment(segment: &SchemaSegment, packet: &Packet) -> Result<String, CoherenceError> {
    let mut out = String::new();
    for part in segment {
        out.push_str(&render_part(part, packet)?);
    }
    if out.is_empty() || out.contains('/') || out.contains("..") {
        return Err(CoherenceError::UnsafePathSegment(out));
    }
    Ok(out)
}

/// Validate every `{key}`/group source referenced by `schema` is present in
/// `packet`, render each segment, join under `root.memory_dir()`, and
/// (unless `dry_run`) persist `packet` as JSON at the resulting path.
pub fn transmit(
    root: &RootContext,
    packet: &Packet,
    schema: &Schema,
    dry_run: bool,
) -> Result<PathBuf, CoherenceError> {
    for key in schema.referenced_keys() {
        if !packet.contains_key(key) {
            return Err(CoherenceError::InvalidPacket(key.to_string()));
        }
    }

    let mut path = root.memory_dir();
    for segment in &schema.segments {
        path.push(render_segment(segment, packet)?);
    }

    if !dry_run {
        let bytes = serde_json::to_vec_pretty(packet)?;
        atomic_write(&path, &bytes)?;
    }

    Ok(path)
}

/// Build a glob pattern by substituting known `constraints` into their
/// schema positions and leaving unknown positions as `*`.
pub fn receive(root: &RootContext, schema: &Schema, constraints: &Packet) -> String {
    let mut pieces = vec![root.memory_dir().to_string_lossy().to_string()];
    for segment in &schema.segments {
        let rendered = render_segment(segment, constraints);
        pieces.push(rendered.unwrap_or_else(|_| "*".to_string()));
    }
    pieces.join("/")
}

pub fn derive(paths: &[String]) -> Result<Schema, CoherenceError> {
    schema::derive(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet() -> Packet {
        let mut p = Packet::new();
        p.insert("outcome".into(), PacketValue::Str("success".into()));
        p.insert("tool_family".into(), PacketValue::Str("search".into()));
        p.insert("step".into(), PacketValue::Num(5.0));
        p
    }

    #[test]
    fn routing_round_trip_matches_worked_example() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RootContext::new(tmp.path());
        let schema = Schema::parse("outcome={outcome}/tool_family={tool_family}/decile(step)/{step}.json").unwrap();

        let path = transmit(&root, &packet(), &schema, false).unwrap();
        assert_eq!(
            path,
            root.memory_dir().join("outcome=success").join("tool_family=search").join("0-9").join("5.json")
        );
        assert!(path.exists());

        let contents = std::fs::read_to_string(&path).unwrap();
        let roundtrip: Packet = serde_json::from_str(&contents).unwrap();
        assert_eq!(roundtrip, packet());
    }

    #[test]
    fn dry_run_does_not_write() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RootContext::new(tmp.path());
        let schema = Schema::parse("{outcome}.json").unwrap();
        let path = transmit(&root, &packet(), &schema, true).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn missing_key_is_invalid_packet() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RootContext::new(tmp.path());
        let schema = Schema::parse("{missing}.json").unwrap();
        let err = transmit(&root, &packet(), &schema, true).unwrap_err();
        assert!(matches!(err, CoherenceError::InvalidPacket(_)));
    }

    #[test]
    fn traversal_attempt_is_sanitized_or_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RootContext::new(tmp.path());
        let mut p = Packet::new();
        p.insert("k".into(), PacketValue::Str("../../etc/passwd".into()));
        let schema = Schema::parse("{k}.json").unwrap();
        let path = transmit(&root, &p, &schema, true).unwrap();
        assert!(path.starts_with(root.memory_dir()));
        assert!(!path.to_string_lossy().contains(".."));
    }

    #[test]
    fn receive_substitutes_known_constraints_and_wildcards_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let root = RootContext::new(tmp.path());
        let schema = Schema::parse("outcome={outcome}/tool_family={tool_family}/decile(step)/{step}.json").unwrap();

        let mut constraints = Packet::new();
        constraints.insert("outcome".into(), PacketValue::Str("success".into()));

        let glob = receive(&root, &schema, &constraints);
        assert!(glob.ends_with("outcome=success/*/*/*"));
    }
}
