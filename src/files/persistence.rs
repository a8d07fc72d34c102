use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PipelineError, io_error},
    files::{
        pipeline::{FilesPipeline, PipelineSlot},
        publish::publish_atomically,
    },
    model::ModelKey,
};

const PERSISTENCE_VERSION: u64 = 1;

/// Stores one files pipeline as a stage-name → path mapping on disk.
#[derive(Debug, Clone)]
pub struct FilesPipelinePersistence {
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedFilesPipeline {
    version: u64,
    #[serde(default)]
    model_key: Option<ModelKey>,
    files: BTreeMap<String, PathBuf>,
}

impl FilesPipelinePersistence {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<state_dir>/<supplier>-<model>-<version>.json`
    pub fn for_model(state_dir: &Path, model_key: &ModelKey) -> Self {
        Self::new(state_dir.join(format!("{}.json", model_key.dir_name())))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<FilesPipeline, PipelineError> {
        let content = fs::read_to_string(&self.path).map_err(|err| {
            io_error(format!(
                "failed to read files pipeline state '{}': {err}",
                self.path.display()
            ))
        })?;

        let parsed: PersistedFilesPipeline = serde_json::from_str(&content).map_err(|err| {
            io_error(format!(
                "failed to parse files pipeline state '{}': {err}",
                self.path.display()
            ))
        })?;
        if parsed.version != PERSISTENCE_VERSION {
            return Err(io_error(format!(
                "unsupported files pipeline state version {} at '{}'",
                parsed.version,
                self.path.display()
            )));
        }

        let mut pipeline = match parsed.model_key {
            Some(model_key) => FilesPipeline::for_model(model_key),
            None => FilesPipeline::new(),
        };
        for (name, path) in parsed.files {
            let slot = PipelineSlot::from_name(&name).ok_or_else(|| {
                io_error(format!(
                    "unknown pipeline slot '{name}' in '{}'",
                    self.path.display()
                ))
            })?;
            pipeline.set_slot(slot, Some(path));
        }

        Ok(pipeline)
    }

    pub fn save(&self, pipeline: &FilesPipeline) -> Result<(), PipelineError> {
        let persisted = PersistedFilesPipeline {
            version: PERSISTENCE_VERSION,
            model_key: pipeline.model_key().cloned(),
            files: pipeline.snapshot(),
        };

        publish_atomically(&self.path, &CancellationToken::new(), |tmp_path| {
            let file = fs::File::create(tmp_path).map_err(|err| {
                io_error(format!(
                    "failed to create files pipeline temp file '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &persisted).map_err(|err| {
                io_error(format!(
                    "failed to serialize files pipeline state '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            writer.write_all(b"\n").map_err(|err| {
                io_error(format!(
                    "failed to finalize files pipeline state '{}': {err}",
                    tmp_path.display()
                ))
            })?;
            writer.flush().map_err(|err| {
                io_error(format!(
                    "failed to flush files pipeline state '{}': {err}",
                    tmp_path.display()
                ))
            })
        })
        .map(|_| ())
    }
}
