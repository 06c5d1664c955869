//! Execution backend abstraction.
//!
//! An [`Access`] session is bound to one target (the local machine, a remote host), owns its
//! transport and must be closed with [`Access::terminate`]. Sessions are opened per invocation
//! through an [`AccessFactory`].
mod error;
pub use error::AccessError;

mod request;
pub use request::{ExecOutput, ExecRequest};

use std::path::Path;

use async_trait::async_trait;
use xrun_model::InvokerConfig;

/// Uniform command and file capability set of one target.
///
/// Paths are interpreted on the target, except for the source side of
/// [`Access::copy_dir_to_remote`], which is always local.
#[async_trait]
pub trait Access: Send + Sync {
    /// Host identity of the target.
    fn host(&self) -> &str;

    /// Run a shell command line. A non-zero exit is reported in [`ExecOutput`], not as an error.
    async fn exec(&self, req: ExecRequest) -> Result<ExecOutput, AccessError>;

    async fn exists(&self, path: &Path) -> Result<bool, AccessError>;

    /// Create a directory with all missing parents.
    async fn mkdir(&self, path: &Path) -> Result<(), AccessError>;

    /// Remove a file or directory tree. Missing paths are not an error.
    async fn remove(&self, path: &Path) -> Result<(), AccessError>;

    /// Write a file, creating parent directories as needed.
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), AccessError>;

    /// Read a file; a missing file is [`AccessError::NotFound`].
    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, AccessError>;

    /// Copy a file or directory tree on the target.
    async fn copy(&self, from: &Path, to: &Path) -> Result<(), AccessError>;

    /// Move a file or directory on the target.
    async fn move_path(&self, from: &Path, to: &Path) -> Result<(), AccessError>;

    /// Copy a local directory tree to `remote` on the target.
    async fn copy_dir_to_remote(&self, local: &Path, remote: &Path) -> Result<(), AccessError>;

    /// Close the session and release its transport.
    async fn terminate(&self) -> Result<(), AccessError>;
}

/// Opens [`Access`] sessions from an invoker configuration.
#[async_trait]
pub trait AccessFactory: Send + Sync {
    /// Open a session for the backend selected by `config.access`.
    ///
    /// Unsupported backends fail with [`AccessError::Unsupported`].
    async fn open(&self, config: &InvokerConfig) -> Result<Box<dyn Access>, AccessError>;
}
