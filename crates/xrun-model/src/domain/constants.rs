//! Common model-level constants.
//!
//! Well-known parameter names and defaults shared by the orchestrator and the invokers.

/// Parameter carrying the invoker-specific configuration block.
///
/// The block is consumed by the invoker itself and is never mapped into the program environment.
pub const INVOKER_CONFIG_PARAM: &str = "invoker_config";

/// Host identifier used by the local access backend and the exclusivity registry.
pub const LOCAL_HOST: &str = "localhost";

/// Delimiter used when unflattening parameter maps into nested documents.
pub const PATH_DELIMITER: char = '/';

/// Default lower bound of toolchain runs for invokers with a retry policy.
pub const DEFAULT_MIN_RUNS: u32 = 1;

/// Default upper bound of toolchain runs for invokers with a retry policy.
pub const DEFAULT_MAX_RUNS: u32 = 3;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;
