use std::path::{Component, Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, trace};
use xrun_model::{Env, INVOKER_CONFIG_PARAM, Mapping, Schema, ValueMap};

use super::MappingError;
use crate::access::Access;

/// Text form of a parameter value: strings raw, everything else as compact JSON.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn mapped<'a>(
    schema: &'a Schema,
    params: &'a ValueMap,
    mapping: Mapping,
) -> impl Iterator<Item = (&'a String, &'a Value)> + 'a {
    schema
        .iter()
        .filter(move |(_, entry)| entry.mapping == Some(mapping))
        .filter_map(move |(name, _)| {
            params
                .get(name)
                .filter(|v| !v.is_null())
                .map(|v| (name, v))
        })
}

/// Extend `base` with every env-mapped parameter whose name is not configured yet.
pub fn env_overlay(schema: &Schema, params: &ValueMap, base: &Env) -> Env {
    let mut env = base.clone();
    for (name, value) in mapped(schema, params, Mapping::Env) {
        if !env.push_if_absent(name.as_str(), value_text(value)) {
            trace!(param = %name, "env already configured, mapping skipped");
        }
    }
    env
}

/// Resolve stdin content: the first stdin-mapped parameter by name replaces `configured`.
pub fn stdin_content(schema: &Schema, params: &ValueMap, configured: Option<&str>) -> Option<String> {
    mapped(schema, params, Mapping::Stdin)
        .map(|(_, v)| value_text(v))
        .next()
        .or_else(|| configured.map(str::to_string))
}

/// Relative file path for a parameter, rejecting absolute and parent-escaping paths.
pub(crate) fn relative_path(name: &str, raw: &str) -> Result<PathBuf, MappingError> {
    let path = Path::new(raw);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if raw.is_empty() || escapes {
        return Err(MappingError::InvalidPath {
            name: name.to_string(),
            path: raw.to_string(),
        });
    }
    Ok(path.to_path_buf())
}

/// File-mapped parameters as `(relative path, content)`.
///
/// The path defaults to the parameter name when the entry declares no `file_path`.
pub fn file_parameters(
    schema: &Schema,
    params: &ValueMap,
) -> Result<Vec<(PathBuf, Vec<u8>)>, MappingError> {
    let mut out = Vec::new();
    for (name, value) in mapped(schema, params, Mapping::File) {
        let raw = schema
            .get(name)
            .and_then(|e| e.file_path.as_deref())
            .unwrap_or(name.as_str());
        out.push((relative_path(name, raw)?, value_text(value).into_bytes()));
    }
    Ok(out)
}

/// Write file-mapped parameters below `dir` on the target.
pub async fn write_parameters(
    access: &dyn Access,
    schema: &Schema,
    params: &ValueMap,
    dir: &Path,
) -> Result<(), MappingError> {
    for (rel, content) in file_parameters(schema, params)? {
        let path = dir.join(&rel);
        debug!(path = %path.display(), bytes = content.len(), "writing parameter file");
        access.write_file(&path, &content).await?;
    }
    Ok(())
}

/// Unflatten the parameter map into a nested document, splitting names on `delimiter`.
///
/// `invoker_config` is excluded. Keys are applied in sorted order; a scalar is replaced by an
/// object when a deeper key addresses it.
pub fn unflatten(params: &ValueMap, delimiter: char) -> Value {
    let mut root = Map::new();
    let mut keys: Vec<&String> = params
        .keys()
        .filter(|k| k.as_str() != INVOKER_CONFIG_PARAM)
        .collect();
    keys.sort();

    for key in keys {
        let parts: Vec<&str> = key.split(delimiter).filter(|p| !p.is_empty()).collect();
        insert_path(&mut root, &parts, params[key.as_str()].clone());
    }

    Value::Object(root)
}

fn insert_path(node: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            let key = last.to_string();
            match node.get_mut(&key) {
                Some(Value::Object(existing)) => {
                    if let Value::Object(incoming) = value {
                        existing.extend(incoming);
                    }
                }
                _ => {
                    node.insert(key, value);
                }
            }
        }
        [head, rest @ ..] => {
            let slot = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(child) = slot {
                insert_path(child, rest, value);
            }
        }
    }
}
