use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    files::{FilesPipeline, PipelineSlot},
    keys::KeysSummary,
    model::Resources,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Parent of the per-model output directories.
    pub files_root: PathBuf,
    /// Where pipeline snapshots are persisted between runs.
    pub state_dir: PathBuf,
    /// Exposure column joined against keys `LocID`.
    pub exposure_id_column: String,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            files_root: PathBuf::from("./Files"),
            state_dir: PathBuf::from("./state/pipelines"),
            exposure_id_column: "ROW_ID".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Executed { path: PathBuf, rows: u64 },
    /// The slot already pointed at a usable file.
    Skipped { path: PathBuf },
}

impl StageOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Executed { path, .. } | Self::Skipped { path } => path,
        }
    }

    pub fn was_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysReport {
    pub outcome: StageOutcome,
    pub summary: KeysSummary,
}

/// Caller-supplied inputs for one `generate_oasis_files` run.
#[derive(Debug, Clone, Default)]
pub struct GenerateOverrides {
    /// Existing files to adopt instead of running the producing stage.
    pub files: BTreeMap<PipelineSlot, PathBuf>,
    /// Merged into the model's resources before any stage runs.
    pub resources: Resources,
    /// Re-run stages even when their output slot is already usable.
    pub force: bool,
}

impl GenerateOverrides {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }

    pub fn with_file(mut self, slot: PipelineSlot, path: impl Into<PathBuf>) -> Self {
        self.files.insert(slot, path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OasisFilesReport {
    pub files_pipeline: FilesPipeline,
    pub executed: Vec<PipelineSlot>,
    pub skipped: Vec<PipelineSlot>,
    pub keys: Option<KeysSummary>,
}

impl OasisFilesReport {
    pub fn new(files_pipeline: FilesPipeline) -> Self {
        Self {
            files_pipeline,
            executed: Vec::new(),
            skipped: Vec::new(),
            keys: None,
        }
    }

    pub(crate) fn record(&mut self, slot: PipelineSlot, outcome: &StageOutcome) {
        if outcome.was_executed() {
            self.executed.push(slot);
        } else {
            self.skipped.push(slot);
        }
    }

    pub fn unmatched(&self) -> u64 {
        self.keys.map(|summary| summary.unmatched).unwrap_or_default()
    }
}
