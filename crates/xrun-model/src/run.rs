use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ValueMap;
use crate::error::{ModelError, ModelResult};
use crate::spec::Executable;

/// Opaque unique run identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh random (UUID v4) identifier.
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run lifecycle state.
///
/// `prepare → running → {finished, error}`; the last two are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Prepare,
    #[default]
    Running,
    Finished,
    Error,
}

impl RunStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Finished | RunStatus::Error)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Prepare => "prepare",
            RunStatus::Running => "running",
            RunStatus::Finished => "finished",
            RunStatus::Error => "error",
        }
    }
}

impl FromStr for RunStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s {
            "prepare" => Ok(RunStatus::Prepare),
            "running" => Ok(RunStatus::Running),
            "finished" => Ok(RunStatus::Finished),
            "error" => Ok(RunStatus::Error),
            other => Err(ModelError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a run is addressed to: a registered executable or an invoker with an embedded payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RunTarget {
    Executable(String),
    Invoker(String),
}

impl RunTarget {
    pub fn name(&self) -> &str {
        match self {
            RunTarget::Executable(n) | RunTarget::Invoker(n) => n,
        }
    }

    /// Collection segment used in resource paths.
    pub fn collection(&self) -> &'static str {
        match self {
            RunTarget::Executable(_) => "executables",
            RunTarget::Invoker(_) => "invokers",
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection(), self.name())
    }
}

/// Body of a run submission.
///
/// `status` is kept as raw text so that unknown values surface as [`ModelError::InvalidStatus`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub parameters: ValueMap,
    #[serde(default)]
    pub executable: Option<Executable>,
}

impl SubmitRequest {
    /// Resolve the requested status; missing means `running`.
    pub fn status(&self) -> ModelResult<RunStatus> {
        match self.status.as_deref() {
            None => Ok(RunStatus::Running),
            Some(s) => s.parse(),
        }
    }
}

/// Persisted run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoker_name: Option<String>,

    #[serde(default)]
    pub status: RunStatus,

    #[serde(default)]
    pub parameters: ValueMap,

    /// Populated only once the run reaches a terminal state.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub results: ValueMap,

    /// Embedded executable payload, required for invoker runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<Executable>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    /// Build a fresh record for `target` from a submission body.
    ///
    /// Validates the status and the presence of an embedded executable for invoker runs.
    /// Does not stamp `created`; that belongs to the caller persisting the record.
    pub fn from_request(target: RunTarget, req: SubmitRequest) -> ModelResult<Self> {
        let status = req.status()?;

        let (executable_name, invoker_name, executable) = match target {
            RunTarget::Executable(name) => (Some(name), None, None),
            RunTarget::Invoker(name) => {
                let Some(exec) = req.executable.filter(|e| !e.is_empty()) else {
                    return Err(ModelError::Invalid("executable must be specified".into()));
                };
                (None, Some(name), Some(exec))
            }
        };

        let id = match req.id {
            Some(id) if !id.trim().is_empty() => RunId::from(id),
            _ => RunId::new_v4(),
        };

        Ok(Self {
            id,
            executable_name,
            invoker_name,
            status,
            parameters: req.parameters,
            results: ValueMap::new(),
            executable,
            created: None,
            finished: None,
            failed: None,
            error: None,
        })
    }

    pub fn target(&self) -> Option<RunTarget> {
        if let Some(name) = &self.invoker_name {
            return Some(RunTarget::Invoker(name.clone()));
        }
        self.executable_name
            .as_ref()
            .map(|name| RunTarget::Executable(name.clone()))
    }

    /// Apply a field-level patch: `null` deletes a field, any other value overwrites it.
    ///
    /// The identifier cannot be patched. The result is re-validated as a whole.
    pub fn patched(&self, patch: &ValueMap) -> ModelResult<Run> {
        if let Some(status) = patch.get("status").and_then(|v| v.as_str()) {
            status.parse::<RunStatus>()?;
        }

        let mut doc = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => return Err(ModelError::Invalid("run is not an object".into())),
            Err(e) => return Err(ModelError::Invalid(e.to_string())),
        };

        for (key, value) in patch {
            if key == "id" {
                continue;
            }
            if value.is_null() {
                doc.remove(key);
            } else {
                doc.insert(key.clone(), value.clone());
            }
        }

        serde_json::from_value(serde_json::Value::Object(doc))
            .map_err(|e| ModelError::Invalid(e.to_string()))
    }

    /// Mark the run finished with the given results.
    pub fn finish(&mut self, results: ValueMap, at: String) {
        self.status = RunStatus::Finished;
        self.results = results;
        self.finished = Some(at);
        self.error = None;
    }

    /// Mark the run failed with a message; partial results are kept.
    pub fn fail(&mut self, message: impl Into<String>, results: ValueMap, at: String) {
        self.status = RunStatus::Error;
        self.results = results;
        self.failed = Some(at);
        self.error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(body: serde_json::Value) -> SubmitRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn status_defaults_to_running() {
        let run = Run::from_request(RunTarget::Executable("e".into()), request(json!({})))
            .unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.executable_name.as_deref(), Some("e"));
        assert!(run.invoker_name.is_none());
    }

    #[test]
    fn invalid_status_is_rejected() {
        let err = Run::from_request(
            RunTarget::Executable("e".into()),
            request(json!({"status": "paused"})),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::InvalidStatus(s) if s == "paused"));
    }

    #[test]
    fn invoker_run_requires_embedded_executable() {
        let err = Run::from_request(RunTarget::Invoker("shell".into()), request(json!({})))
            .unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));

        let err = Run::from_request(
            RunTarget::Invoker("shell".into()),
            request(json!({"executable": {}})),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn caller_supplied_id_is_honoured() {
        let run = Run::from_request(
            RunTarget::Executable("e".into()),
            request(json!({"id": "fixed-1"})),
        )
        .unwrap();
        assert_eq!(run.id.as_str(), "fixed-1");
    }

    #[test]
    fn patch_deletes_on_null_and_keeps_id() {
        let mut run = Run::from_request(
            RunTarget::Executable("e".into()),
            request(json!({"status": "prepare", "parameters": {"a": 1}})),
        )
        .unwrap();
        run.created = Some("t0".into());

        let patch = json!({"id": "other", "created": null, "status": "running", "parameters": {"b": 2}});
        let out = run.patched(patch.as_object().unwrap()).unwrap();

        assert_eq!(out.id, run.id);
        assert!(out.created.is_none());
        assert_eq!(out.status, RunStatus::Running);
        assert_eq!(out.parameters.get("b"), Some(&json!(2)));
        assert!(out.parameters.get("a").is_none());
    }

    #[test]
    fn patch_rejects_unknown_status() {
        let run = Run::from_request(RunTarget::Executable("e".into()), request(json!({})))
            .unwrap();
        let patch = json!({"status": "done"});
        assert!(matches!(
            run.patched(patch.as_object().unwrap()),
            Err(ModelError::InvalidStatus(_))
        ));
    }

    #[test]
    fn empty_results_are_not_serialized() {
        let run = Run::from_request(RunTarget::Executable("e".into()), request(json!({})))
            .unwrap();
        let v = serde_json::to_value(&run).unwrap();
        assert!(v.get("results").is_none());
        assert_eq!(v["status"], "running");
    }
}
