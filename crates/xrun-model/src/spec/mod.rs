mod schema;
pub use schema::{Mapping, Schema, SchemaEntry, SchemaSet};

mod executable;
pub use executable::{Executable, ExecutableFile, FileContent};

mod invoker;
pub use invoker::InvokerSpec;

mod api_spec;
pub use api_spec::ApiSpec;
