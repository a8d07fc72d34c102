use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::Value;

use crate::{keys::KeysLookupService, transforms::ExposureTransform};

pub const OASIS_FILES_PATH: &str = "oasis_files_path";
pub const SOURCE_EXPOSURES_FILE_PATH: &str = "source_exposures_file_path";
pub const CANONICAL_EXPOSURES_PROFILE: &str = "canonical_exposures_profile";
pub const CANONICAL_EXPOSURES_PROFILE_JSON: &str = "canonical_exposures_profile_json";
pub const CANONICAL_EXPOSURES_PROFILE_JSON_PATH: &str = "canonical_exposures_profile_json_path";
pub const SOURCE_TO_CANONICAL_TRANSFORM: &str = "source_to_canonical_transform";
pub const CANONICAL_TO_MODEL_TRANSFORM: &str = "canonical_to_model_transform";
pub const KEYS_LOOKUP: &str = "keys_lookup";
pub const EXPOSURE_ID_COLUMN: &str = "exposure_id_column";

pub type Resources = BTreeMap<String, ResourceValue>;

/// One entry of a model's resource bag.
#[derive(Clone)]
pub enum ResourceValue {
    Path(PathBuf),
    Text(String),
    Json(Value),
    Transform(Arc<dyn ExposureTransform>),
    KeysLookup(Arc<dyn KeysLookupService>),
}

impl ResourceValue {
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Text(_) => "text",
            Self::Json(_) => "json",
            Self::Transform(_) => "transform",
            Self::KeysLookup(_) => "keys_lookup",
        }
    }
}

impl fmt::Debug for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Transform(transform) => f.debug_tuple("Transform").field(&transform.name()).finish(),
            Self::KeysLookup(_) => f.write_str("KeysLookup(..)"),
        }
    }
}

impl From<PathBuf> for ResourceValue {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Value> for ResourceValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
