use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{PipelineError, configuration_error},
    model::{
        ResourceValue, Resources,
        resources::{
            CANONICAL_EXPOSURES_PROFILE, CANONICAL_EXPOSURES_PROFILE_JSON,
            CANONICAL_EXPOSURES_PROFILE_JSON_PATH,
        },
    },
};

const TIV_FIELD_NAME: &str = "TIV";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileElement {
    #[serde(rename = "ProfileElementName", default)]
    pub profile_element_name: Option<String>,
    #[serde(rename = "FieldName", default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(rename = "CoverageTypeID", default, skip_serializing_if = "Option::is_none")]
    pub coverage_type_id: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Field definitions of a canonical exposures schema, keyed by column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalProfile {
    elements: BTreeMap<String, ProfileElement>,
}

impl CanonicalProfile {
    pub fn from_json(value: &Value) -> Result<Self, PipelineError> {
        serde_json::from_value::<Self>(value.clone())
            .map_err(|err| {
                configuration_error(format!("canonical exposures profile is malformed: {err}"))
            })?
            .validated()
    }

    pub fn from_text(text: &str) -> Result<Self, PipelineError> {
        serde_json::from_str::<Self>(text)
            .map_err(|err| {
                configuration_error(format!("canonical exposures profile JSON is invalid: {err}"))
            })?
            .validated()
    }

    /// A coverage type may have at most one TIV element.
    fn validated(self) -> Result<Self, PipelineError> {
        let mut tiv_owners: BTreeMap<u32, &str> = BTreeMap::new();
        for (name, element) in &self.elements {
            if element.field_name.as_deref() != Some(TIV_FIELD_NAME) {
                continue;
            }
            let Some(coverage_type) = element.coverage_type_id else {
                continue;
            };
            if let Some(previous) = tiv_owners.insert(coverage_type, name) {
                return Err(configuration_error(format!(
                    "canonical profile elements '{previous}' and '{name}' both hold the TIV of coverage type {coverage_type}"
                )));
            }
        }
        Ok(self)
    }

    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|err| {
            configuration_error(format!(
                "canonical exposures profile '{}' is unreadable: {err}",
                path.display()
            ))
        })?;
        Self::from_text(&text)
    }

    /// Reads the profile from the first available source: inline JSON text,
    /// a JSON file path, then an already-parsed profile.
    pub fn from_resources(resources: &Resources) -> Result<Self, PipelineError> {
        if let Some(value) = resources.get(CANONICAL_EXPOSURES_PROFILE_JSON) {
            let text = value.as_text().ok_or_else(|| {
                configuration_error(format!(
                    "'{CANONICAL_EXPOSURES_PROFILE_JSON}' must be JSON text, got {}",
                    value.variant_name()
                ))
            })?;
            return Self::from_text(text);
        }
        if let Some(value) = resources.get(CANONICAL_EXPOSURES_PROFILE_JSON_PATH) {
            let path = value.as_path().ok_or_else(|| {
                configuration_error(format!(
                    "'{CANONICAL_EXPOSURES_PROFILE_JSON_PATH}' must be a path, got {}",
                    value.variant_name()
                ))
            })?;
            return Self::from_file(path);
        }
        Self::loaded(resources)
    }

    /// The profile previously stored by `load_canonical_profile`.
    pub fn loaded(resources: &Resources) -> Result<Self, PipelineError> {
        match resources.get(CANONICAL_EXPOSURES_PROFILE) {
            Some(ResourceValue::Json(value)) => Self::from_json(value),
            Some(other) => Err(configuration_error(format!(
                "'{CANONICAL_EXPOSURES_PROFILE}' holds a {} value",
                other.variant_name()
            ))),
            None => Err(configuration_error(
                "no canonical exposures profile is configured",
            )),
        }
    }

    pub fn has_source(resources: &Resources) -> bool {
        resources.contains_key(CANONICAL_EXPOSURES_PROFILE_JSON)
            || resources.contains_key(CANONICAL_EXPOSURES_PROFILE_JSON_PATH)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, name: &str) -> Option<&ProfileElement> {
        self.elements.get(name)
    }

    /// Coverage type → exposure column holding its TIV.
    pub fn tiv_columns(&self) -> BTreeMap<u32, &str> {
        self.elements
            .values()
            .filter(|element| element.field_name.as_deref() == Some(TIV_FIELD_NAME))
            .filter_map(|element| {
                Some((
                    element.coverage_type_id?,
                    element.profile_element_name.as_deref()?,
                ))
            })
            .collect()
    }

    pub fn tiv_column(&self, coverage_type: u32) -> Option<&str> {
        self.tiv_columns().get(&coverage_type).copied()
    }
}
