//! Built-in invokers.
mod chef;
pub use chef::{CHEF_INSTALL_MARKER, CHEF_WORK_ROOT, ChefInvoker, SUPERMARKET_URL};

mod runtime;
pub use runtime::{RuntimeInvoker, Toolchain};

mod session;

mod shell;
pub use shell::{SHELL_WORK_ROOT, ShellInvoker};

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use xrun_core::registry::InvokerRegistry;

/// Register `shell`, `python`, `ruby` and `chef` with default settings.
///
/// After this call, executables naming one of these invokers can be run.
pub fn register_builtin_invokers(registry: &mut InvokerRegistry) {
    registry.register(Arc::new(ShellInvoker::new()));
    registry.register(Arc::new(RuntimeInvoker::python()));
    registry.register(Arc::new(RuntimeInvoker::ruby()));
    registry.register(Arc::new(ChefInvoker::new()));
}
