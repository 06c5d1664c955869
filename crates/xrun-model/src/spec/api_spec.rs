use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Executable, InvokerSpec};
use crate::error::{ModelError, ModelResult};

/// Catalogue of executables and invokers served by one daemon.
///
/// Loaded from a JSON document; relative paths inside it are resolved against the document's
/// directory. Each pipeline run works on its own clone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSpec {
    #[serde(default)]
    pub executables: BTreeMap<String, Executable>,

    #[serde(default)]
    pub invokers: BTreeMap<String, InvokerSpec>,

    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl ApiSpec {
    /// Read and normalize an API spec file.
    pub fn load(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ModelError::SpecIo {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_json_str(&raw, base_dir)
    }

    /// Parse and normalize an API spec document.
    pub fn from_json_str(raw: &str, base_dir: impl Into<PathBuf>) -> ModelResult<Self> {
        let mut spec: ApiSpec =
            serde_json::from_str(raw).map_err(|e| ModelError::SpecParse(e.to_string()))?;
        spec.base_dir = base_dir.into();
        spec.normalize();
        Ok(spec)
    }

    fn normalize(&mut self) {
        for (name, exec) in self.executables.iter_mut() {
            exec.name = name.clone();
            if let Some(p) = exec.path.as_mut() {
                if p.is_relative() {
                    *p = self.base_dir.join(&*p);
                }
            }
        }
        for (name, inv) in self.invokers.iter_mut() {
            inv.name = name.clone();
            if let Some(p) = inv.path.as_mut() {
                if p.is_relative() {
                    *p = self.base_dir.join(&*p);
                }
            }
        }
    }

    pub fn executable(&self, name: &str) -> Option<&Executable> {
        self.executables.get(name)
    }

    pub fn invoker(&self, name: &str) -> Option<&InvokerSpec> {
        self.invokers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "executables": {
            "hello": {
                "path": "executables/hello",
                "invoker_name": "shell",
                "parameters_schema": {"cmd": {"type": "string", "default": "echo hi"}},
                "parameters_required": ["cmd"]
            },
            "abs": {"path": "/opt/abs", "invoker_name": "shell"}
        },
        "invokers": {
            "shell": {"path": "invokers/shell", "expose": true},
            "chef": {"path": "invokers/chef"}
        }
    }"#;

    #[test]
    fn names_are_filled_and_relative_paths_resolved() {
        let spec = ApiSpec::from_json_str(DOC, "/srv/api").unwrap();

        let hello = spec.executable("hello").unwrap();
        assert_eq!(hello.name, "hello");
        assert_eq!(hello.path.as_deref(), Some(Path::new("/srv/api/executables/hello")));
        assert_eq!(
            spec.executable("abs").unwrap().path.as_deref(),
            Some(Path::new("/opt/abs"))
        );

        let shell = spec.invoker("shell").unwrap();
        assert_eq!(shell.name, "shell");
        assert!(shell.expose.is_enabled());
        assert!(spec.invoker("chef").unwrap().expose.is_disabled());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("apispec.json");
        std::fs::write(&file, DOC).unwrap();

        let spec = ApiSpec::load(&file).unwrap();
        assert_eq!(spec.base_dir, dir.path());
        assert_eq!(spec.executables.len(), 2);
    }

    #[test]
    fn missing_file_and_bad_json_are_reported() {
        assert!(matches!(
            ApiSpec::load("/nonexistent/apispec.json"),
            Err(ModelError::SpecIo { .. })
        ));
        assert!(matches!(
            ApiSpec::from_json_str("{", "."),
            Err(ModelError::SpecParse(_))
        ));
    }
}
