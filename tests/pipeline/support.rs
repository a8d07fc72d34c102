use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use serde_json::json;
use uuid::Uuid;

use oasis_pipeline::{
    error::{PipelineError, lookup_service_error},
    exposures::{ExposuresManager, ManagerSettings},
    keys::{DictionaryKeysLookup, DictionaryLookupConfig, KeysLookupService, KeysRecord},
    model::{
        Model, ModelKey, ModelRegistry, ResourceValue,
        resources::{
            CANONICAL_EXPOSURES_PROFILE_JSON, CANONICAL_TO_MODEL_TRANSFORM, KEYS_LOOKUP,
            SOURCE_EXPOSURES_FILE_PATH, SOURCE_TO_CANONICAL_TRANSFORM,
        },
    },
};

/// Three locations; the third has a postal code the lookup does not know.
pub const SOURCE_LOCATIONS: &str = "\
LocNumber,PostalCode,OccupancyCode,BuildingTIV
L0001,AB1 2CD,1050,220000
L0002,AB3 4EF,1050,480000
L0003,XY9 9ZZ,1050,135000
";

/// Scratch directory removed on drop.
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(label: &str) -> Self {
        let root = std::env::temp_dir().join(format!("oasis-pipeline-{label}-{}", Uuid::now_v7()));
        fs::create_dir_all(&root).expect("workspace dir should be created");
        Self { root }
    }

    pub fn settings(&self) -> ManagerSettings {
        ManagerSettings {
            files_root: self.root.join("Files"),
            state_dir: self.root.join("state"),
            exposure_id_column: "ROW_ID".to_string(),
        }
    }

    pub fn manager(&self) -> ExposuresManager {
        ExposuresManager::new(self.settings(), Arc::new(ModelRegistry::new()))
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("fixture file should be written");
        path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

pub fn dictionary_config() -> DictionaryLookupConfig {
    serde_json::from_value(json!({
        "peril_id": "WTC",
        "id_column": "ROW_ID",
        "coverage_types": [1],
        "area_peril": { "column": "PostalCode", "values": { "AB1 2CD": 54, "AB3 4EF": 55 } },
        "vulnerability": { "column": "OccupancyCode", "values": { "1050": 8 } }
    }))
    .expect("dictionary config should parse")
}

/// Dictionary lookup that counts how often it was asked for keys.
pub struct CountingLookup {
    inner: DictionaryKeysLookup,
    calls: AtomicUsize,
}

impl CountingLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: DictionaryKeysLookup::new(dictionary_config()).expect("valid lookup"),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeysLookupService for CountingLookup {
    fn name(&self) -> &str {
        "counting-dictionary"
    }

    fn get_keys(&self, model_exposures_file: &Path) -> Result<Vec<KeysRecord>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_keys(model_exposures_file)
    }
}

pub struct UnavailableLookup;

impl KeysLookupService for UnavailableLookup {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn get_keys(&self, _: &Path) -> Result<Vec<KeysRecord>, PipelineError> {
        Err(lookup_service_error("lookup backend is unavailable"))
    }
}

pub fn lookup_resource(service: Arc<dyn KeysLookupService>) -> ResourceValue {
    ResourceValue::KeysLookup(service)
}

/// A model wired with field mapping, passthrough and the given lookup.
pub fn piwind_model(
    workspace: &Workspace,
    version: &str,
    lookup: Arc<dyn KeysLookupService>,
) -> Model {
    let source = workspace.write(&format!("SourceLoc-{version}.csv"), SOURCE_LOCATIONS);
    let mut model = Model::create("OasisLMF", "PiWind", version, None).expect("valid model");
    model.set_resource(SOURCE_EXPOSURES_FILE_PATH, ResourceValue::Path(source));
    model.set_resource(
        CANONICAL_EXPOSURES_PROFILE_JSON,
        ResourceValue::Text(
            json!({
                "ROW_ID": { "ProfileElementName": "ROW_ID" },
                "WSCV1VAL": { "ProfileElementName": "WSCV1VAL", "FieldName": "TIV", "CoverageTypeID": 1 }
            })
            .to_string(),
        ),
    );
    model.set_resource(
        SOURCE_TO_CANONICAL_TRANSFORM,
        ResourceValue::Json(json!({
            "type": "field-mapping",
            "sequence_column": "ROW_ID",
            "keep_unmapped": true,
            "fields": [
                { "from": "LocNumber", "to": "ACCNTNUM" },
                { "from": "BuildingTIV", "to": "WSCV1VAL" }
            ]
        })),
    );
    model.set_resource(
        CANONICAL_TO_MODEL_TRANSFORM,
        ResourceValue::Json(json!({ "type": "passthrough" })),
    );
    model.set_resource(KEYS_LOOKUP, lookup_resource(lookup));
    model
}

pub fn key(version: &str) -> ModelKey {
    ModelKey::new("OasisLMF", "PiWind", version).expect("valid key")
}

/// Data rows of a CSV file, header excluded.
pub fn data_rows(path: &Path) -> usize {
    let text = fs::read_to_string(path).expect("file should be readable");
    text.lines().skip(1).filter(|line| !line.is_empty()).count()
}

/// Names of leftover temporary files in `dir`.
pub fn temp_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(".tmp"))
                .collect()
        })
        .unwrap_or_default()
}
