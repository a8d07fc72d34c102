pub mod registry;
pub mod resources;
pub mod types;

pub use registry::{ModelRegistry, SharedModel};
pub use resources::{ResourceValue, Resources};
pub use types::{Model, ModelKey};
