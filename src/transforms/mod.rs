pub mod command;
pub mod descriptor;
pub mod field_mapping;
pub mod noop;
pub mod ports;

pub use command::CommandTransform;
pub use descriptor::{TransformDescriptor, resolve_transform};
pub use field_mapping::{FieldMapping, FieldMappingTransform};
pub use noop::PassthroughTransform;
pub use ports::ExposureTransform;
