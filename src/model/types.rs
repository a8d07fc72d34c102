use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, validation_error},
    files::FilesPipeline,
    model::resources::{ResourceValue, Resources},
};

/// Composite `supplier_id/model_id/model_version_id` identifier of a model.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelKey(String);

impl ModelKey {
    pub fn new(
        supplier_id: &str,
        model_id: &str,
        model_version_id: &str,
    ) -> Result<Self, PipelineError> {
        for (field, value) in [
            ("supplier_id", supplier_id),
            ("model_id", model_id),
            ("model_version_id", model_version_id),
        ] {
            if value.trim().is_empty() {
                return Err(validation_error(format!("model {field} cannot be empty")));
            }
            if value.contains('/') {
                return Err(validation_error(format!(
                    "model {field} '{value}' cannot contain '/'"
                )));
            }
        }

        Ok(Self(format!("{supplier_id}/{model_id}/{model_version_id}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form of the key, e.g. `OasisLMF-PiWind-0.0.0.1`.
    pub fn dir_name(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A catastrophe model: immutable identity plus a mutable resource bag and the
/// files pipeline it exclusively owns.
#[derive(Debug, Clone)]
pub struct Model {
    key: ModelKey,
    supplier_id: String,
    model_id: String,
    model_version_id: String,
    pub resources: Resources,
    files_pipeline: FilesPipeline,
}

impl Model {
    pub fn create(
        supplier_id: impl Into<String>,
        model_id: impl Into<String>,
        model_version_id: impl Into<String>,
        resources: Option<Resources>,
    ) -> Result<Self, PipelineError> {
        let supplier_id = supplier_id.into();
        let model_id = model_id.into();
        let model_version_id = model_version_id.into();
        let key = ModelKey::new(&supplier_id, &model_id, &model_version_id)?;
        let files_pipeline = FilesPipeline::for_model(key.clone());

        Ok(Self {
            key,
            supplier_id,
            model_id,
            model_version_id,
            resources: resources.unwrap_or_default(),
            files_pipeline,
        })
    }

    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    pub fn supplier_id(&self) -> &str {
        &self.supplier_id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn model_version_id(&self) -> &str {
        &self.model_version_id
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceValue> {
        self.resources.get(name)
    }

    pub fn set_resource(&mut self, name: impl Into<String>, value: ResourceValue) {
        self.resources.insert(name.into(), value);
    }

    pub fn remove_resource(&mut self, name: &str) -> Option<ResourceValue> {
        self.resources.remove(name)
    }

    pub fn files_pipeline(&self) -> &FilesPipeline {
        &self.files_pipeline
    }

    pub fn files_pipeline_mut(&mut self) -> &mut FilesPipeline {
        &mut self.files_pipeline
    }

    /// Replaces the model's pipeline with an explicit one, e.g. a restored snapshot.
    pub fn attach_files_pipeline(&mut self, mut pipeline: FilesPipeline) -> Result<(), PipelineError> {
        match pipeline.model_key() {
            Some(key) if key != &self.key => {
                return Err(validation_error(format!(
                    "files pipeline belongs to model '{key}', not '{}'",
                    self.key
                )));
            }
            Some(_) => {}
            None => pipeline.set_model_key(self.key.clone()),
        }
        self.files_pipeline = pipeline;
        Ok(())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model {}", self.key)
    }
}
