pub mod persistence;
pub mod pipeline;
pub mod publish;
pub mod table;

pub use persistence::FilesPipelinePersistence;
pub use pipeline::{FilesPipeline, PipelineSlot, PipelineStage};
pub use publish::{ensure_parent_dir, is_trusted_file, publish_atomically};
pub use table::ExposureTable;
