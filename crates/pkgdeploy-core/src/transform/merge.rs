//! Structured merge for `.transform` sources.
//!
//! JSON targets merge as objects; anything else merges as XML. Install only
//! adds what is missing, so user values always win. Revert removes this
//! package's contribution unless another installed package contributes the
//! same key or element.

use std::path::Path;

use anyhow::Context;
use serde_json::{Map, Value};

use super::xml::{Document, Element};
use super::{RevertContext, Transformer};
use crate::project::{ProjectContext, ProjectTree};

#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredMerge;

fn is_json(target: &Path) -> bool {
    target
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Stable content hash of a JSON value, independent of key order.
pub fn hash_json(value: &Value) -> String {
    let normalized = normalize_json(value);
    let bytes = serde_json::to_vec(&normalized).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let mut normalized = Map::new();
            for key in keys {
                if let Some(child) = map.get(key) {
                    normalized.insert(key.clone(), normalize_json(child));
                }
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_json).collect()),
        _ => value.clone(),
    }
}

fn parse_object(bytes: &[u8], what: &str) -> anyhow::Result<Map<String, Value>> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match serde_json::from_slice(bytes).with_context(|| format!("Failed to parse {what} as JSON"))? {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("{} must be a JSON object", what),
    }
}

/// Add keys of `fragment` that `target` lacks, descending into objects
/// present on both sides.
pub fn merge_missing(target: &mut Map<String, Value>, fragment: &Map<String, Value>) {
    for (key, value) in fragment {
        if let (Some(Value::Object(existing)), Value::Object(child)) = (target.get_mut(key), value) {
            merge_missing(existing, child);
        } else if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        }
    }
}

/// Remove keys `fragment` contributed to `target`, skipping keys that
/// `others` also contribute and values the user has changed.
pub fn subtract(
    target: &mut Map<String, Value>,
    fragment: &Map<String, Value>,
    others: &Map<String, Value>,
) {
    for (key, value) in fragment {
        let other = others.get(key);
        let remove = match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(child)) => match other {
                Some(Value::Object(other_child)) => {
                    subtract(existing, child, other_child);
                    false
                }
                Some(_) => false,
                None => {
                    subtract(existing, child, &Map::new());
                    existing.is_empty()
                }
            },
            (Some(existing), _) => other.is_none() && hash_json(existing) == hash_json(value),
            (None, _) => false,
        };
        if remove {
            target.remove(key);
        }
    }
}

fn write_json(
    project: &mut dyn ProjectTree,
    target: &Path,
    map: Map<String, Value>,
) -> anyhow::Result<()> {
    let mut bytes = serde_json::to_vec_pretty(&Value::Object(map))?;
    bytes.push(b'\n');
    project
        .add_file(target, &bytes)
        .with_context(|| format!("Failed to write {}", target.display()))
}

fn read_target(project: &dyn ProjectTree, target: &Path) -> anyhow::Result<Vec<u8>> {
    project
        .read_file(target)
        .with_context(|| format!("Failed to read {}", target.display()))
}

impl StructuredMerge {
    fn transform_json(
        &self,
        source: &[u8],
        target: &Path,
        project: &mut dyn ProjectTree,
    ) -> anyhow::Result<()> {
        let fragment = parse_object(source, "transform source")?;
        let merged = if project.file_exists(target) {
            let mut existing = parse_object(&read_target(&*project, target)?, "target")?;
            merge_missing(&mut existing, &fragment);
            existing
        } else {
            fragment
        };
        write_json(project, target, merged)
    }

    fn revert_json(
        &self,
        source: &[u8],
        target: &Path,
        others: &RevertContext<'_>,
        project: &mut dyn ProjectTree,
    ) -> anyhow::Result<()> {
        let fragment = parse_object(source, "transform source")?;

        let mut other_keys = Map::new();
        for other in others.read_sources()? {
            merge_missing(&mut other_keys, &parse_object(&other, "other transform source")?);
        }

        let mut existing = parse_object(&read_target(&*project, target)?, "target")?;
        subtract(&mut existing, &fragment, &other_keys);
        write_json(project, target, existing)
    }

    fn transform_xml(
        &self,
        source: &[u8],
        target: &Path,
        project: &mut dyn ProjectTree,
    ) -> anyhow::Result<()> {
        let fragment = Document::parse(source).context("Failed to parse transform source")?;
        let mut document = if project.file_exists(target) {
            Document::parse(&read_target(&*project, target)?)
                .with_context(|| format!("Failed to parse {}", target.display()))?
        } else {
            Document::new(Element::new(fragment.root.name.clone()))
        };

        document.root.merge_with(&fragment.root);
        project
            .add_file(target, &document.to_bytes()?)
            .with_context(|| format!("Failed to write {}", target.display()))
    }

    fn revert_xml(
        &self,
        source: &[u8],
        target: &Path,
        others: &RevertContext<'_>,
        project: &mut dyn ProjectTree,
    ) -> anyhow::Result<()> {
        let fragment = Document::parse(source).context("Failed to parse transform source")?;

        let mut other_content = Element::new(fragment.root.name.clone());
        for other in others.read_sources()? {
            let other = Document::parse(&other).context("Failed to parse other transform source")?;
            other_content.merge_with(&other.root);
        }

        // Only what this package alone contributed is taken out.
        let mut own = fragment.root;
        own.except(&mut other_content);

        let mut document = Document::parse(&read_target(&*project, target)?)
            .with_context(|| format!("Failed to parse {}", target.display()))?;
        document.root.except(&mut own);
        project
            .add_file(target, &document.to_bytes()?)
            .with_context(|| format!("Failed to write {}", target.display()))
    }
}

impl Transformer for StructuredMerge {
    fn transform(
        &self,
        source: &[u8],
        target: &Path,
        project: &mut dyn ProjectTree,
        _context: &dyn ProjectContext,
    ) -> anyhow::Result<()> {
        if is_json(target) {
            self.transform_json(source, target, project)
        } else {
            self.transform_xml(source, target, project)
        }
    }

    fn revert(
        &self,
        source: &[u8],
        target: &Path,
        others: &RevertContext<'_>,
        project: &mut dyn ProjectTree,
        _context: &dyn ProjectContext,
    ) -> anyhow::Result<()> {
        if !project.file_exists(target) {
            return Ok(());
        }
        if is_json(target) {
            self.revert_json(source, target, others, project)
        } else {
            self.revert_xml(source, target, others, project)
        }
    }
}
