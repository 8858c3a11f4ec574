//! Schema parsing, rendering, and corpus-driven derivation.
//!
//! A schema is authored as a `/`-separated template string (e.g.
//! `"outcome={outcome}/tool_family={tool_family}/decile(step)/{step}.json"`)
//! and parsed into a sequence of segments, each a sequence of parts. Most
//! segments are a single part; `{step}.json` is two (`Key` + `Literal`).

use crate::CoherenceError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Decile(String),
    HexPrefix(String, usize),
    Enum(String),
}

impl GroupKind {
    fn source_key(&self) -> &str {
        match self {
            GroupKind::Decile(k) => k,
            GroupKind::HexPrefix(k, _) => k,
            GroupKind::Enum(k) => k,
        }
    }

    fn render(&self) -> String {
        match self {
            GroupKind::Decile(k) => format!("decile({k})"),
            GroupKind::HexPrefix(k, n) => format!("hex({k},{n})"),
            GroupKind::Enum(k) => format!("enum({k})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaPart {
    Literal(String),
    Key(String),
    Group(GroupKind),
}

pub type SchemaSegment = Vec<SchemaPart>;

/// A parsed routing template. Serializes as the template string on the wire
/// (matching the string form MCP callers pass to `route`/receive in
/// `spec.md` §8's worked scenarios) rather than as a structured document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub segments: Vec<SchemaSegment>,
}

impl Schema {
    pub fn parse(template: &str) -> Result<Self, CoherenceError> {
        let mut segments = Vec::new();
        for raw in template.split('/') {
            if raw.is_empty() {
                continue;
            }
            segments.push(parse_segment(raw)?);
        }
        if segments.is_empty() {
            return Err(CoherenceError::InvalidSchema("empty schema".into()));
        }
        Ok(Self { segments })
    }

    pub fn render_template(&self) -> String {
        self.segments
            .iter()
            .map(render_segment)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Every `{key}`/group source key referenced anywhere in the schema.
    pub fn referenced_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        for seg in &self.segments {
            for part in seg {
                match part {
                    SchemaPart::Key(k) => keys.push(k.as_str()),
                    SchemaPart::Group(g) => keys.push(g.source_key()),
                    SchemaPart::Literal(_) => {}
                }
            }
        }
        keys
    }
}

impl Serialize for Schema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.render_template())
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Schema::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn parse_segment(raw: &str) -> Result<SchemaSegment, CoherenceError> {
    if let Some(inner) = raw.strip_prefix("decile(").and_then(|s| s.strip_suffix(')')) {
        return Ok(vec![SchemaPart::Group(GroupKind::Decile(inner.to_string()))]);
    }
    if let Some(inner) = raw.strip_prefix("enum(").and_then(|s| s.strip_suffix(')')) {
        return Ok(vec![SchemaPart::Group(GroupKind::Enum(inner.to_string()))]);
    }
    if let Some(inner) = raw.strip_prefix("hex(").and_then(|s| s.strip_suffix(')')) {
        let (key, len) = inner
            .split_once(',')
            .ok_or_else(|| CoherenceError::InvalidSchema(format!("malformed hex() segment: {raw}")))?;
        let len: usize = len
            .trim()
            .parse()
            .map_err(|_| CoherenceError::InvalidSchema(format!("malformed hex() length: {raw}")))?;
        return Ok(vec![SchemaPart::Group(GroupKind::HexPrefix(key.trim().to_string(), len))]);
    }

    // mixed literal/{key} segment, e.g. "outcome={outcome}" or "{step}.json"
    let mut parts = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            parts.push(SchemaPart::Literal(rest[..open].to_string()));
        }
        let close = rest[open..]
            .find('}')
            .ok_or_else(|| CoherenceError::InvalidSchema(format!("unclosed '{{' in segment: {raw}")))?
            + open;
        let key = &rest[open + 1..close];
        if key.is_empty() {
            return Err(CoherenceError::InvalidSchema(format!("empty key in segment: {raw}")));
        }
        parts.push(SchemaPart::Key(key.to_string()));
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        parts.push(SchemaPart::Literal(rest.to_string()));
    }
    if parts.is_empty() {
        parts.push(SchemaPart::Literal(String::new()));
    }
    Ok(parts)
}

fn render_segment(seg: &SchemaSegment) -> String {
    if seg.len() == 1 {
        if let SchemaPart::Group(g) = &seg[0] {
            return g.render();
        }
    }
    seg.iter()
        .map(|part| match part {
            SchemaPart::Literal(s) => s.clone(),
            SchemaPart::Key(k) => format!("{{{k}}}"),
            SchemaPart::Group(g) => g.render(),
        })
        .collect()
}

// --- derivation -------------------------------------------------------

/// Infer a schema from a corpus of already-routed paths. Every path is
/// split on `/`; the shortest path's segment count bounds the comparison
/// (shorter paths are the common structural prefix other paths extend).
pub fn derive(paths: &[String]) -> Result<Schema, CoherenceError> {
    if paths.is_empty() {
        return Err(CoherenceError::InvalidSchema("cannot derive from an empty corpus".into()));
    }
    let split: Vec<Vec<&str>> = paths.iter().map(|p| p.trim_matches('/').split('/').collect()).collect();
    let width = split.iter().map(|s| s.len()).min().unwrap();

    let mut segments = Vec::with_capacity(width);
    for idx in 0..width {
        let values: Vec<&str> = split.iter().map(|s| s[idx]).collect();
        segments.push(derive_segment(idx, &values));
    }
    Ok(Schema { segments })
}

fn derive_segment(idx: usize, values: &[&str]) -> SchemaSegment {
    let distinct: std::collections::BTreeSet<&str> = values.iter().copied().collect();
    if distinct.len() == 1 {
        return vec![SchemaPart::Literal(values[0].to_string())];
    }

    let prefix = common_prefix(values);
    let suffix = common_suffix(values, prefix.len());
    let middles: Vec<&str> = values.iter().map(|v| &v[prefix.len()..v.len() - suffix.len()]).collect();

    let key_name = if !prefix.is_empty() && prefix.ends_with('=') {
        prefix.trim_end_matches('=').to_string()
    } else {
        format!("key{idx}")
    };

    let mut parts = Vec::new();
    if !prefix.is_empty() {
        parts.push(SchemaPart::Literal(prefix.clone()));
    }

    if middles.iter().all(|m| is_decile_range(m)) {
        parts.push(SchemaPart::Group(GroupKind::Decile(key_name)));
    } else if middles.iter().all(|m| is_hex(m)) && middles.iter().all(|m| m.len() == middles[0].len()) {
        parts.push(SchemaPart::Group(GroupKind::HexPrefix(key_name, middles[0].len())));
    } else if distinct.len() <= values.len() / 3 + 1 && prefix.is_empty() && suffix.is_empty() {
        parts.push(SchemaPart::Group(GroupKind::Enum(key_name)));
    } else {
        parts.push(SchemaPart::Key(key_name));
    }

    if !suffix.is_empty() {
        parts.push(SchemaPart::Literal(suffix));
    }
    parts
}

fn is_decile_range(s: &str) -> bool {
    let Some((lo, hi)) = s.split_once('-') else { return false };
    lo.chars().all(|c| c.is_ascii_digit()) && hi.chars().all(|c| c.is_ascii_digit()) && !lo.is_empty() && !hi.is_empty()
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit()) && s.chars().any(|c| c.is_ascii_alphabetic())
}

fn common_prefix(values: &[&str]) -> String {
    let mut prefix = values[0].to_string();
    for v in &values[1..] {
        let len = prefix.chars().zip(v.chars()).take_while(|(a, b)| a == b).count();
        prefix.truncate(prefix.char_indices().nth(len).map(|(i, _)| i).unwrap_or(prefix.len()));
        if prefix.is_empty() {
            break;
        }
    }
    prefix
}

fn common_suffix(values: &[&str], prefix_len: usize) -> String {
    let mut suffix = values[0][prefix_len..].chars().rev().collect::<String>();
    for v in &values[1..] {
        let rev: String = v[prefix_len..].chars().rev().collect();
        let len = suffix.chars().zip(rev.chars()).take_while(|(a, b)| a == b).count();
        suffix.truncate(suffix.char_indices().nth(len).map(|(i, _)| i).unwrap_or(suffix.len()));
        if suffix.is_empty() {
            break;
        }
    }
    suffix.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_worked_example_schema() {
        let schema = Schema::parse("outcome={outcome}/tool_family={tool_family}/decile(step)/{step}.json").unwrap();
        assert_eq!(schema.segments.len(), 4);
        assert_eq!(
            schema.segments[2],
            vec![SchemaPart::Group(GroupKind::Decile("step".into()))]
        );
        assert_eq!(
            schema.segments[3],
            vec![SchemaPart::Key("step".into()), SchemaPart::Literal(".json".into())]
        );
    }

    #[test]
    fn render_round_trips_template() {
        let template = "outcome={outcome}/tool_family={tool_family}/decile(step)/{step}.json";
        let schema = Schema::parse(template).unwrap();
        assert_eq!(schema.render_template(), template);
    }

    #[test]
    fn derive_reconstructs_key_and_group_segments() {
        let paths = vec![
            "memory/outcome=success/tool_family=search/0-9/5.json".to_string(),
            "memory/outcome=failure/tool_family=search/10-19/12.json".to_string(),
        ];
        let schema = derive(&paths).unwrap();
        assert!(matches!(schema.segments[1][0], SchemaPart::Key(_)));
        assert!(matches!(schema.segments[3][0], SchemaPart::Group(GroupKind::Decile(_))));
    }
}
