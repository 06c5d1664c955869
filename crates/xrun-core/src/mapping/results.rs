use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};
use xrun_model::{Mapping, Schema, ValueMap};

use super::MappingError;
use super::params::relative_path;
use crate::access::{Access, AccessError};

/// Raw material gathered by an invoker for result mapping.
///
/// `files` holds one slot per file-mapped result; `None` marks a file that was not there.
/// Files that exist but could not be read keep the failure in `file_errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub stdout: String,
    pub stderr: String,
    pub files: BTreeMap<String, Option<Vec<u8>>>,
    pub file_errors: BTreeMap<String, String>,
}

impl Collected {
    pub fn from_streams(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            files: BTreeMap::new(),
            file_errors: BTreeMap::new(),
        }
    }

    /// Append the streams of another command, keeping earlier output first.
    pub fn append_streams(&mut self, stdout: &str, stderr: &str) {
        self.stdout.push_str(stdout);
        self.stderr.push_str(stderr);
    }

    /// Unclaimed captured streams as results, used for failed runs.
    pub fn stream_results(&self) -> ValueMap {
        let mut out = ValueMap::new();
        if !self.stdout.is_empty() {
            out.insert("stdout".into(), Value::String(self.stdout.clone()));
        }
        if !self.stderr.is_empty() {
            out.insert("stderr".into(), Value::String(self.stderr.clone()));
        }
        out
    }
}

/// Read every file-mapped result below `dir` on the target.
///
/// Missing files are recorded as `None` and unreadable ones with their error; [`map_results`]
/// turns both into errors.
pub async fn collect_result_files(
    access: &dyn Access,
    schema: &Schema,
    dir: &Path,
    collected: &mut Collected,
) {
    for (name, entry) in schema {
        if entry.mapping != Some(Mapping::File) {
            continue;
        }
        let raw = entry.file_path.as_deref().unwrap_or(name.as_str());
        let rel = match relative_path(name, raw) {
            Ok(rel) => rel,
            Err(_) => {
                warn!(result = %name, path = %raw, "result file path rejected");
                collected.files.insert(name.clone(), None);
                collected
                    .file_errors
                    .insert(name.clone(), "path leaves the run directory".into());
                continue;
            }
        };
        let path = dir.join(rel);
        let content = match access.read_file(&path).await {
            Ok(bytes) => Some(bytes),
            Err(AccessError::NotFound(_)) => None,
            Err(e) => {
                warn!(result = %name, path = %path.display(), error = %e, "result file unreadable");
                collected.file_errors.insert(name.clone(), e.to_string());
                None
            }
        };
        debug!(result = %name, found = content.is_some(), "result file collected");
        collected.files.insert(name.clone(), content);
    }
}

fn decode(name: &str, text: String, as_object: bool) -> Result<Value, MappingError> {
    if !as_object {
        return Ok(Value::String(text));
    }
    serde_json::from_str(&text).map_err(|e| MappingError::InvalidJson {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Map collected output onto the declared results.
///
/// `stdout`/`stderr` results claim the captured stream; unclaimed streams are returned under
/// their generic names. A missing result file or undecodable `type: object` value fails.
pub fn map_results(schema: &Schema, collected: Collected) -> Result<ValueMap, MappingError> {
    let Collected {
        stdout,
        stderr,
        mut files,
        mut file_errors,
    } = collected;

    let mut out = ValueMap::new();
    let mut stdout_claimed = false;
    let mut stderr_claimed = false;

    for (name, entry) in schema {
        let text = match entry.mapping {
            Some(Mapping::Stdout) => {
                stdout_claimed = true;
                stdout.clone()
            }
            Some(Mapping::Stderr) => {
                stderr_claimed = true;
                stderr.clone()
            }
            Some(Mapping::File) => match files.remove(name).flatten() {
                Some(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                None => {
                    let path = entry.file_path.clone().unwrap_or_else(|| name.clone());
                    return Err(match file_errors.remove(name) {
                        Some(reason) => MappingError::UnreadableFile {
                            name: name.clone(),
                            path,
                            reason,
                        },
                        None => MappingError::MissingFile {
                            name: name.clone(),
                            path,
                        },
                    });
                }
            },
            _ => continue,
        };
        out.insert(name.clone(), decode(name, text, entry.is_object())?);
    }

    if !stdout_claimed && !stdout.is_empty() && !out.contains_key("stdout") {
        out.insert("stdout".into(), Value::String(stdout));
    }
    if !stderr_claimed && !stderr.is_empty() && !out.contains_key("stderr") {
        out.insert("stderr".into(), Value::String(stderr));
    }

    Ok(out)
}
