mod kv;
pub use kv::KeyValue;

mod env;
pub use env::Env;

mod flag;
pub use flag::Flag;

mod constants;
pub use constants::{
    DEFAULT_MAX_RUNS, DEFAULT_MIN_RUNS, DEFAULT_SSH_PORT, INVOKER_CONFIG_PARAM, LOCAL_HOST,
    PATH_DELIMITER,
};

mod clock;
pub use clock::now_rfc3339;

/// JSON object keyed by parameter or result name.
pub type ValueMap = serde_json::Map<String, serde_json::Value>;
