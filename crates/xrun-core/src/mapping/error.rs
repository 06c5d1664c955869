use thiserror::Error;

use crate::access::AccessError;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("result '{name}': file {path} not found")]
    MissingFile { name: String, path: String },

    #[error("result '{name}': file {path} could not be read: {reason}")]
    UnreadableFile {
        name: String,
        path: String,
        reason: String,
    },

    #[error("result '{name}' is not valid JSON: {reason}")]
    InvalidJson { name: String, reason: String },

    #[error("parameter '{name}' has an invalid file path: {path}")]
    InvalidPath { name: String, path: String },

    #[error(transparent)]
    Access(#[from] AccessError),
}
