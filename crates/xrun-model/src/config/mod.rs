mod access;
pub use access::{AccessKind, SshTarget};

mod invoker_config;
pub use invoker_config::InvokerConfig;
