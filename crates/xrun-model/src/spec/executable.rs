use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SchemaSet;

/// Content source of an embedded executable file. Exactly one per file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileContent {
    /// Written verbatim.
    Text(String),
    /// Serialized as JSON.
    Object(Value),
    /// Decoded from standard base64.
    Base64(String),
    /// Fetched over HTTP(S).
    Url(String),
}

/// File of an embedded executable, addressed relative to the staging directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutableFile {
    pub path: String,
    #[serde(flatten)]
    pub content: FileContent,
}

/// Program definition: sources plus parameter/result declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Executable {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Program sources. Relative paths are resolved against the API spec directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ExecutableFile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoker_name: Option<String>,

    #[serde(flatten)]
    pub schemas: SchemaSet,

    /// Chef: cookbook name used to lay out the cookbook directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookbook_name: Option<String>,

    /// Chef: subdirectory holding downloaded cookbook dependencies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies_subdir: Option<String>,
}

impl Executable {
    /// An executable with neither sources nor declarations.
    pub fn is_empty(&self) -> bool {
        self.path.is_none()
            && self.files.is_empty()
            && self.invoker_name.is_none()
            && self.schemas.is_empty()
    }

    /// Whether sources must be materialized from embedded files.
    pub fn is_embedded(&self) -> bool {
        !self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn embedded_files_parse_by_content_key() {
        let exec: Executable = serde_json::from_value(json!({
            "files": [
                {"path": "a.txt", "text": "hi"},
                {"path": "conf/b.json", "object": {"k": [1, 2]}},
                {"path": "c.bin", "base64": "AAE="},
                {"path": "d.sh", "url": "http://example.invalid/d.sh"}
            ],
            "parameters_schema": {"input": {"mapping": "stdin"}}
        }))
        .unwrap();

        assert!(exec.is_embedded());
        assert!(!exec.is_empty());
        assert_eq!(exec.files[0].content, FileContent::Text("hi".into()));
        assert!(matches!(exec.files[1].content, FileContent::Object(_)));
        assert!(matches!(exec.files[2].content, FileContent::Base64(_)));
        assert!(matches!(exec.files[3].content, FileContent::Url(_)));
        assert!(exec.schemas.parameters_schema.contains_key("input"));
    }

    #[test]
    fn empty_object_is_empty_executable() {
        let exec: Executable = serde_json::from_value(json!({})).unwrap();
        assert!(exec.is_empty());
    }
}
