use std::{collections::BTreeMap, fs, sync::Arc};

use serde_json::Value;

use crate::{
    error::{PipelineError, configuration_error, lookup_service_error},
    keys::{
        dictionary::{DictionaryKeysLookup, DictionaryLookupConfig},
        ports::KeysLookupService,
    },
    model::{Model, ResourceValue, resources::KEYS_LOOKUP},
};

pub type KeysLookupConstructor = Arc<
    dyn Fn(&Model, &Value) -> Result<Arc<dyn KeysLookupService>, PipelineError> + Send + Sync,
>;

/// Maps a configuration tag (`"type"` of the `keys_lookup` resource) to a
/// service constructor.
#[derive(Clone)]
pub struct KeysLookupFactory {
    constructors: BTreeMap<String, KeysLookupConstructor>,
}

impl Default for KeysLookupFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register("dictionary", |_model, config| {
            let config: DictionaryLookupConfig = serde_json::from_value(strip_tag(config))
                .map_err(|err| {
                    lookup_service_error(format!("invalid dictionary lookup config: {err}"))
                })?;
            Ok(Arc::new(DictionaryKeysLookup::new(config)?) as Arc<dyn KeysLookupService>)
        });
        factory
    }
}

impl KeysLookupFactory {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn register<F>(&mut self, tag: impl Into<String>, constructor: F)
    where
        F: Fn(&Model, &Value) -> Result<Arc<dyn KeysLookupService>, PipelineError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(tag.into(), Arc::new(constructor));
    }

    pub fn tags(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Builds the lookup service described by the model's `keys_lookup` resource.
    pub fn create(&self, model: &Model) -> Result<Arc<dyn KeysLookupService>, PipelineError> {
        let resource = model.resource(KEYS_LOOKUP).ok_or_else(|| {
            configuration_error(format!("{model} has no '{KEYS_LOOKUP}' resource"))
        })?;

        let config = match resource {
            ResourceValue::KeysLookup(service) => return Ok(Arc::clone(service)),
            ResourceValue::Json(value) => value.clone(),
            ResourceValue::Text(text) => parse_config(text)?,
            ResourceValue::Path(path) => {
                let text = fs::read_to_string(path).map_err(|err| {
                    configuration_error(format!(
                        "failed to read keys lookup config '{}': {err}",
                        path.display()
                    ))
                })?;
                parse_config(&text)?
            }
            other => {
                return Err(configuration_error(format!(
                    "resource '{KEYS_LOOKUP}' holds a {} value",
                    other.variant_name()
                )));
            }
        };

        let tag = config
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                configuration_error(format!(
                    "'{KEYS_LOOKUP}' config of {model} has no \"type\" tag"
                ))
            })?;
        let constructor = self.constructors.get(tag).ok_or_else(|| {
            lookup_service_error(format!("unknown keys lookup service '{tag}'"))
        })?;

        constructor(model, &config).map_err(|err| {
            lookup_service_error(format!(
                "failed to create '{tag}' keys lookup for {model}: {}",
                err.message
            ))
        })
    }
}

fn parse_config(text: &str) -> Result<Value, PipelineError> {
    json5::from_str(text)
        .map_err(|err| configuration_error(format!("invalid keys lookup config: {err}")))
}

fn strip_tag(config: &Value) -> Value {
    let mut config = config.clone();
    if let Some(map) = config.as_object_mut() {
        map.remove("type");
    }
    config
}
