use std::{fs, path::Path, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{PipelineError, configuration_error, transformation_error},
    model::{ResourceValue, Resources},
    transforms::{
        command::CommandTransform, field_mapping::FieldMappingTransform,
        noop::PassthroughTransform, ports::ExposureTransform,
    },
};

/// Serializable form of a transform, as found in model configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransformDescriptor {
    Passthrough,
    FieldMapping(FieldMappingTransform),
    Command(CommandTransform),
}

impl TransformDescriptor {
    pub fn from_json(value: &Value) -> Result<Self, PipelineError> {
        serde_json::from_value(value.clone())
            .map_err(|err| transformation_error(format!("invalid transform descriptor: {err}")))
    }

    pub fn from_text(text: &str) -> Result<Self, PipelineError> {
        json5::from_str(text)
            .map_err(|err| transformation_error(format!("invalid transform descriptor: {err}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|err| {
            transformation_error(format!(
                "failed to read transform descriptor '{}': {err}",
                path.display()
            ))
        })?;
        Self::from_text(&text)
    }

    pub fn into_transform(self) -> Arc<dyn ExposureTransform> {
        match self {
            Self::Passthrough => Arc::new(PassthroughTransform),
            Self::FieldMapping(transform) => Arc::new(transform),
            Self::Command(transform) => Arc::new(transform),
        }
    }
}

/// Turns the resource stored under `key` into an applicable transform.
pub fn resolve_transform(
    resources: &Resources,
    key: &str,
) -> Result<Arc<dyn ExposureTransform>, PipelineError> {
    let value = resources
        .get(key)
        .ok_or_else(|| configuration_error(format!("model resources have no '{key}'")))?;

    match value {
        ResourceValue::Transform(transform) => Ok(Arc::clone(transform)),
        ResourceValue::Json(value) => Ok(TransformDescriptor::from_json(value)?.into_transform()),
        ResourceValue::Text(text) => Ok(TransformDescriptor::from_text(text)?.into_transform()),
        ResourceValue::Path(path) => Ok(TransformDescriptor::from_file(path)?.into_transform()),
        other => Err(transformation_error(format!(
            "resource '{key}' holds a {} value, not a transform descriptor",
            other.variant_name()
        ))),
    }
}
