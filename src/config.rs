use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::PipelineError,
    exposures::ManagerSettings,
    model::{Model, ResourceValue, Resources, resources},
};

const DEFAULT_SCHEMA_FILE: &str = "oasis-pipeline.schema.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_files_root() -> PathBuf {
    PathBuf::from("./Files")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./state/pipelines")
}

fn default_exposure_id_column() -> String {
    "ROW_ID".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_files_root")]
    pub files_root: PathBuf,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_exposure_id_column")]
    pub exposure_id_column: String,
    #[serde(default)]
    pub force: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            files_root: default_files_root(),
            state_dir: default_state_dir(),
            exposure_id_column: default_exposure_id_column(),
            force: false,
        }
    }
}

impl PipelineConfig {
    pub fn manager_settings(&self) -> ManagerSettings {
        ManagerSettings {
            files_root: self.files_root.clone(),
            state_dir: self.state_dir.clone(),
            exposure_id_column: self.exposure_id_column.clone(),
        }
    }
}

/// A descriptor given inline in the config, or a path to a file holding it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DescriptorSource {
    Path(PathBuf),
    Inline(Value),
}

impl DescriptorSource {
    fn into_resource(self) -> ResourceValue {
        match self {
            Self::Path(path) => ResourceValue::Path(path),
            Self::Inline(value) => ResourceValue::Json(value),
        }
    }

    fn resolve_against(&mut self, base: &Path) {
        if let Self::Path(path) = self {
            resolve_relative(path, base);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub supplier_id: String,
    pub model_id: String,
    pub model_version_id: String,
    #[serde(default)]
    pub oasis_files_path: Option<PathBuf>,
    #[serde(default)]
    pub source_exposures_file_path: Option<PathBuf>,
    #[serde(default)]
    pub canonical_exposures_profile_json_path: Option<PathBuf>,
    #[serde(default)]
    pub source_to_canonical_transform: Option<DescriptorSource>,
    #[serde(default)]
    pub canonical_to_model_transform: Option<DescriptorSource>,
    #[serde(default)]
    pub keys_lookup: Option<DescriptorSource>,
    #[serde(default)]
    pub exposure_id_column: Option<String>,
}

impl ModelConfig {
    pub fn to_model(&self) -> Result<Model, PipelineError> {
        let mut model_resources = Resources::new();
        let paths = [
            (resources::OASIS_FILES_PATH, &self.oasis_files_path),
            (
                resources::SOURCE_EXPOSURES_FILE_PATH,
                &self.source_exposures_file_path,
            ),
            (
                resources::CANONICAL_EXPOSURES_PROFILE_JSON_PATH,
                &self.canonical_exposures_profile_json_path,
            ),
        ];
        for (key, path) in paths {
            if let Some(path) = path {
                model_resources.insert(key.to_string(), ResourceValue::Path(path.clone()));
            }
        }

        let descriptors = [
            (
                resources::SOURCE_TO_CANONICAL_TRANSFORM,
                &self.source_to_canonical_transform,
            ),
            (
                resources::CANONICAL_TO_MODEL_TRANSFORM,
                &self.canonical_to_model_transform,
            ),
            (resources::KEYS_LOOKUP, &self.keys_lookup),
        ];
        for (key, descriptor) in descriptors {
            if let Some(descriptor) = descriptor {
                model_resources.insert(key.to_string(), descriptor.clone().into_resource());
            }
        }

        if let Some(column) = &self.exposure_id_column {
            model_resources.insert(
                resources::EXPOSURE_ID_COLUMN.to_string(),
                ResourceValue::Text(column.clone()),
            );
        }

        Model::create(
            self.supplier_id.clone(),
            self.model_id.clone(),
            self.model_version_id.clone(),
            Some(model_resources),
        )
    }

    fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.oasis_files_path,
            &mut self.source_exposures_file_path,
            &mut self.canonical_exposures_profile_json_path,
        ]
        .into_iter()
        .flatten()
        {
            resolve_relative(path, base);
        }
        for descriptor in [
            &mut self.source_to_canonical_transform,
            &mut self.canonical_to_model_transform,
            &mut self.keys_lookup,
        ]
        .into_iter()
        .flatten()
        {
            descriptor.resolve_against(base);
        }
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config = serde_json::from_value(config_value)
            .context("failed to deserialize oasis-pipeline config")?;

        resolve_relative(&mut config.pipeline.files_root, config_base);
        resolve_relative(&mut config.pipeline.state_dir, config_base);
        for model in &mut config.models {
            model.resolve_paths(config_base);
        }

        Ok(config)
    }
}

fn resolve_relative(path: &mut PathBuf, base: &Path) {
    if !path.is_absolute() {
        *path = base.join(&*path);
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(|value| value.as_str()) {
        let configured = PathBuf::from(path_text);
        if configured.is_absolute() {
            return Ok(configured);
        }
        return Ok(config_base.join(&configured));
    }

    let local_default = config_base.join(DEFAULT_SCHEMA_FILE);
    if local_default.exists() {
        return Ok(local_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or {DEFAULT_SCHEMA_FILE}"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
