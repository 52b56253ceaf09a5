pub mod collection;
pub mod file_type;
pub mod pipeline_file;

pub use collection::FileCollection;
pub use file_type::FileType;
pub use pipeline_file::{CheckResult, CheckState, CheckType, PipelineFile, PublishActions};
