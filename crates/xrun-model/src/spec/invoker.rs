use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::SchemaSet;
use crate::Flag;

/// Invoker entry of the API spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokerSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Adapter configuration location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Whether runs may be addressed to this invoker directly.
    #[serde(default)]
    pub expose: Flag,

    /// Declarations merged under every executable run through this invoker.
    #[serde(flatten)]
    pub schemas: SchemaSet,
}
