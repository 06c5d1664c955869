//! Execution backends and invokers.
//!
//! [`access`] provides the local and SSH implementations of
//! [`xrun_core::access::Access`]; [`invokers`] the toolchain adapters registered by the daemon.
pub mod access;
pub use access::{DefaultAccessFactory, LocalAccess, SshAccess};

pub mod invokers;
pub use invokers::{ChefInvoker, RuntimeInvoker, ShellInvoker, Toolchain, register_builtin_invokers};
