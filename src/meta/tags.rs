//! Nested tag maps addressed by slash paths (`a/b/c`).

use serde_json::{Map, Value};

use super::errors::{MetaError, MetaResult};

fn split_tag_path(tag_path: &str) -> MetaResult<Vec<&str>> {
    let trimmed = tag_path
        .strip_prefix("//")
        .or_else(|| tag_path.strip_prefix('/'))
        .unwrap_or(tag_path);
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(MetaError::InvalidTagPath(tag_path.to_string()));
    }
    Ok(parts)
}

/// Walk to the map holding the final segment, creating intermediate maps
fn parent_map<'a>(
    tags: &'a mut Map<String, Value>,
    tag_path: &str,
    parents: &[&str],
) -> MetaResult<&'a mut Map<String, Value>> {
    let mut current = tags;
    for part in parents {
        let node = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = node
            .as_object_mut()
            .ok_or_else(|| MetaError::InvalidTagPath(tag_path.to_string()))?;
    }
    Ok(current)
}

pub(crate) fn add_tag(tags: &mut Map<String, Value>, tag_path: &str, value: &str) -> MetaResult<()> {
    let parts = split_tag_path(tag_path)?;
    let (leaf, parents) = parts
        .split_last()
        .ok_or_else(|| MetaError::InvalidTagPath(tag_path.to_string()))?;
    parent_map(tags, tag_path, parents)?.insert(leaf.to_string(), Value::from(value));
    Ok(())
}

pub(crate) fn remove_tag(tags: &mut Map<String, Value>, tag_path: &str) -> MetaResult<()> {
    let parts = split_tag_path(tag_path)?;
    let (leaf, parents) = parts
        .split_last()
        .ok_or_else(|| MetaError::InvalidTagPath(tag_path.to_string()))?;

    let mut current = tags;
    for part in parents {
        match current.get_mut(*part).and_then(Value::as_object_mut) {
            Some(next) => current = next,
            None => return Ok(()),
        }
    }
    current.remove(*leaf);
    Ok(())
}
