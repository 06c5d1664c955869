mod domain;
pub use domain::{
    DEFAULT_MAX_RUNS, DEFAULT_MIN_RUNS, DEFAULT_SSH_PORT, INVOKER_CONFIG_PARAM, LOCAL_HOST,
    PATH_DELIMITER,
};
pub use domain::{Env, Flag, KeyValue, ValueMap, now_rfc3339};

mod error;
pub use error::{ModelError, ModelResult};

mod run;
pub use run::{Run, RunId, RunStatus, RunTarget, SubmitRequest};

mod spec;
pub use spec::{
    ApiSpec, Executable, ExecutableFile, FileContent, InvokerSpec, Mapping, Schema, SchemaEntry,
    SchemaSet,
};

mod config;
pub use config::{AccessKind, InvokerConfig, SshTarget};

mod strategy;
pub use strategy::{RetryDecision, RetryPolicy};
