use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a parameter is delivered to, or where a result is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mapping {
    /// Parameter exported as an environment variable.
    Env,
    /// Parameter fed to the program's standard input.
    Stdin,
    /// Parameter written to, or result read from, a file.
    File,
    /// Parameter folded into the toolchain's run configuration document.
    RunList,
    /// Result bound to captured standard output.
    Stdout,
    /// Result bound to captured standard error.
    Stderr,
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mapping::Env => "env",
            Mapping::Stdin => "stdin",
            Mapping::File => "file",
            Mapping::RunList => "run_list",
            Mapping::Stdout => "stdout",
            Mapping::Stderr => "stderr",
        };
        f.write_str(s)
    }
}

/// Declaration of a single parameter or result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Mapping>,

    /// Relative file location when `mapping` is `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaEntry {
    pub fn mapped(mapping: Mapping) -> Self {
        Self {
            mapping: Some(mapping),
            ..Self::default()
        }
    }

    /// `type: object` entries carry JSON documents.
    pub fn is_object(&self) -> bool {
        self.kind.as_deref() == Some("object")
    }
}

pub type Schema = BTreeMap<String, SchemaEntry>;

/// Parameter and result declarations shared by executables and invokers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSet {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters_schema: Schema,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters_required: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results_schema: Schema,
}

impl SchemaSet {
    pub fn is_empty(&self) -> bool {
        self.parameters_schema.is_empty()
            && self.parameters_required.is_empty()
            && self.results_schema.is_empty()
    }

    /// Overlay `over` onto `self`.
    ///
    /// Entries with the same name are replaced as a whole by `over`; required lists are
    /// concatenated without duplicates, keeping first-seen order.
    pub fn extended_by(&self, over: &SchemaSet) -> SchemaSet {
        let mut parameters_schema = self.parameters_schema.clone();
        parameters_schema.extend(over.parameters_schema.clone());

        let mut results_schema = self.results_schema.clone();
        results_schema.extend(over.results_schema.clone());

        let mut parameters_required = self.parameters_required.clone();
        for name in &over.parameters_required {
            if !parameters_required.contains(name) {
                parameters_required.push(name.clone());
            }
        }

        SchemaSet {
            parameters_schema,
            parameters_required,
            results_schema,
        }
    }

    /// Fill in declared defaults for required parameters that are missing or null.
    ///
    /// Returns the names that were substituted.
    pub fn apply_defaults(&self, params: &mut serde_json::Map<String, Value>) -> Vec<String> {
        let mut applied = Vec::new();
        for name in &self.parameters_required {
            let missing = params.get(name).is_none_or(Value::is_null);
            if !missing {
                continue;
            }
            if let Some(default) = self
                .parameters_schema
                .get(name)
                .and_then(|e| e.default.clone())
            {
                params.insert(name.clone(), default);
                applied.push(name.clone());
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn set(v: Value) -> SchemaSet {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn executable_entries_win_over_invoker_entries() {
        let invoker = set(json!({
            "parameters_schema": {
                "cmd": {"type": "string", "description": "invoker"},
                "invoker_config": {"type": "object"}
            },
            "parameters_required": ["cmd"]
        }));
        let executable = set(json!({
            "parameters_schema": {"cmd": {"type": "string", "default": "ls"}},
            "parameters_required": ["cmd", "x"]
        }));

        let merged = invoker.extended_by(&executable);

        let cmd = &merged.parameters_schema["cmd"];
        assert_eq!(cmd.default, Some(json!("ls")));
        assert!(cmd.description.is_none());
        assert!(merged.parameters_schema.contains_key("invoker_config"));
        assert_eq!(merged.parameters_required, vec!["cmd", "x"]);
    }

    #[test]
    fn defaults_fill_only_missing_required_parameters() {
        let schemas = set(json!({
            "parameters_schema": {
                "a": {"default": 1},
                "b": {"default": 2},
                "c": {"default": 3}
            },
            "parameters_required": ["a", "b"]
        }));

        let mut params = json!({"b": 20}).as_object().cloned().unwrap();
        let applied = schemas.apply_defaults(&mut params);

        assert_eq!(applied, vec!["a"]);
        assert_eq!(params["a"], json!(1));
        assert_eq!(params["b"], json!(20));
        assert!(!params.contains_key("c"));
    }

    #[test]
    fn unknown_mapping_fails_to_parse() {
        let res: Result<SchemaEntry, _> = serde_json::from_value(json!({"mapping": "socket"}));
        assert!(res.is_err());

        let entry: SchemaEntry =
            serde_json::from_value(json!({"mapping": "run_list", "type": "object"})).unwrap();
        assert_eq!(entry.mapping, Some(Mapping::RunList));
        assert!(entry.is_object());
    }
}
