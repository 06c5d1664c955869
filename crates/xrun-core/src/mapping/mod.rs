//! Parameter delivery before invocation and result read-back after it.
mod error;
pub use error::MappingError;

mod params;
pub use params::{
    env_overlay, file_parameters, stdin_content, unflatten, value_text, write_parameters,
};

mod results;
pub use results::{Collected, collect_result_files, map_results};
