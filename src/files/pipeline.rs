use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::model::ModelKey;

/// File slots of a pipeline, in stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineSlot {
    #[serde(rename = "source_exposures_file")]
    SourceExposures,
    #[serde(rename = "canonical_exposures_file")]
    CanonicalExposures,
    #[serde(rename = "model_exposures_file")]
    ModelExposures,
    #[serde(rename = "keys_file")]
    Keys,
    #[serde(rename = "items_file")]
    Items,
    #[serde(rename = "coverages_file")]
    Coverages,
    #[serde(rename = "gulsummaryxref_file")]
    GulSummaryXref,
}

impl PipelineSlot {
    pub const ALL: [PipelineSlot; 7] = [
        PipelineSlot::SourceExposures,
        PipelineSlot::CanonicalExposures,
        PipelineSlot::ModelExposures,
        PipelineSlot::Keys,
        PipelineSlot::Items,
        PipelineSlot::Coverages,
        PipelineSlot::GulSummaryXref,
    ];

    pub const OASIS_FILES: [PipelineSlot; 3] = [
        PipelineSlot::Items,
        PipelineSlot::Coverages,
        PipelineSlot::GulSummaryXref,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SourceExposures => "source_exposures_file",
            Self::CanonicalExposures => "canonical_exposures_file",
            Self::ModelExposures => "model_exposures_file",
            Self::Keys => "keys_file",
            Self::Items => "items_file",
            Self::Coverages => "coverages_file",
            Self::GulSummaryXref => "gulsummaryxref_file",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }

    /// Slots whose files are derived from this slot's file.
    ///
    /// The three Oasis files are siblings derived from the keys and exposures,
    /// so none of them is downstream of another.
    pub fn downstream(self) -> &'static [PipelineSlot] {
        match self {
            Self::SourceExposures => &[
                Self::CanonicalExposures,
                Self::ModelExposures,
                Self::Keys,
                Self::Items,
                Self::Coverages,
                Self::GulSummaryXref,
            ],
            Self::CanonicalExposures => &[
                Self::ModelExposures,
                Self::Keys,
                Self::Items,
                Self::Coverages,
                Self::GulSummaryXref,
            ],
            Self::ModelExposures => &[
                Self::Keys,
                Self::Items,
                Self::Coverages,
                Self::GulSummaryXref,
            ],
            Self::Keys => &[Self::Items, Self::Coverages, Self::GulSummaryXref],
            Self::Items | Self::Coverages | Self::GulSummaryXref => &[],
        }
    }
}

impl fmt::Display for PipelineSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress of a pipeline, derived from its furthest populated slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineStage {
    Empty,
    SourceLoaded,
    Canonical,
    ModelExposures,
    Keyed,
    ItemsAndCoverages,
    Complete,
}

/// Passive record of where each artifact of a model's pipeline lives.
///
/// Setting a slot never touches the filesystem; whether a recorded file can be
/// trusted is decided by the exposures manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesPipeline {
    model_key: Option<ModelKey>,
    pub source_exposures_file: Option<PathBuf>,
    pub canonical_exposures_file: Option<PathBuf>,
    pub model_exposures_file: Option<PathBuf>,
    pub keys_file: Option<PathBuf>,
    pub items_file: Option<PathBuf>,
    pub coverages_file: Option<PathBuf>,
    pub gulsummaryxref_file: Option<PathBuf>,
}

impl FilesPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_model(model_key: ModelKey) -> Self {
        Self {
            model_key: Some(model_key),
            ..Self::default()
        }
    }

    pub fn with_source_exposures_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_exposures_file = Some(path.into());
        self
    }

    pub fn model_key(&self) -> Option<&ModelKey> {
        self.model_key.as_ref()
    }

    pub fn set_model_key(&mut self, model_key: ModelKey) {
        self.model_key = Some(model_key);
    }

    pub fn slot(&self, slot: PipelineSlot) -> Option<&Path> {
        self.slot_ref(slot).as_deref()
    }

    pub fn set_slot(&mut self, slot: PipelineSlot, path: Option<PathBuf>) {
        *self.slot_mut(slot) = path;
    }

    /// Sets `slot` to a freshly produced file and unsets every slot derived from it.
    pub fn record_output(&mut self, slot: PipelineSlot, path: PathBuf) {
        *self.slot_mut(slot) = Some(path);
        for downstream in slot.downstream() {
            *self.slot_mut(*downstream) = None;
        }
    }

    /// Unsets the named slots, or every slot when `slots` is empty.
    pub fn clear(&mut self, slots: &[PipelineSlot]) {
        let targets: &[PipelineSlot] = if slots.is_empty() {
            &PipelineSlot::ALL
        } else {
            slots
        };
        for slot in targets {
            *self.slot_mut(*slot) = None;
        }
    }

    pub fn is_empty(&self) -> bool {
        PipelineSlot::ALL
            .into_iter()
            .all(|slot| self.slot(slot).is_none())
    }

    pub fn stage(&self) -> PipelineStage {
        let is_set = |slot: PipelineSlot| self.slot(slot).is_some();
        if PipelineSlot::OASIS_FILES.into_iter().all(is_set) {
            PipelineStage::Complete
        } else if is_set(PipelineSlot::Items) && is_set(PipelineSlot::Coverages) {
            PipelineStage::ItemsAndCoverages
        } else if is_set(PipelineSlot::Keys) {
            PipelineStage::Keyed
        } else if is_set(PipelineSlot::ModelExposures) {
            PipelineStage::ModelExposures
        } else if is_set(PipelineSlot::CanonicalExposures) {
            PipelineStage::Canonical
        } else if is_set(PipelineSlot::SourceExposures) {
            PipelineStage::SourceLoaded
        } else {
            PipelineStage::Empty
        }
    }

    pub fn oasis_files(&self) -> BTreeMap<&'static str, Option<&Path>> {
        BTreeMap::from([
            ("items", self.slot(PipelineSlot::Items)),
            ("coverages", self.slot(PipelineSlot::Coverages)),
            ("gulsummaryxref", self.slot(PipelineSlot::GulSummaryXref)),
        ])
    }

    /// Stage-name → path mapping of every populated slot.
    pub fn snapshot(&self) -> BTreeMap<String, PathBuf> {
        PipelineSlot::ALL
            .into_iter()
            .filter_map(|slot| {
                self.slot(slot)
                    .map(|path| (slot.name().to_string(), path.to_path_buf()))
            })
            .collect()
    }

    fn slot_ref(&self, slot: PipelineSlot) -> &Option<PathBuf> {
        match slot {
            PipelineSlot::SourceExposures => &self.source_exposures_file,
            PipelineSlot::CanonicalExposures => &self.canonical_exposures_file,
            PipelineSlot::ModelExposures => &self.model_exposures_file,
            PipelineSlot::Keys => &self.keys_file,
            PipelineSlot::Items => &self.items_file,
            PipelineSlot::Coverages => &self.coverages_file,
            PipelineSlot::GulSummaryXref => &self.gulsummaryxref_file,
        }
    }

    fn slot_mut(&mut self, slot: PipelineSlot) -> &mut Option<PathBuf> {
        match slot {
            PipelineSlot::SourceExposures => &mut self.source_exposures_file,
            PipelineSlot::CanonicalExposures => &mut self.canonical_exposures_file,
            PipelineSlot::ModelExposures => &mut self.model_exposures_file,
            PipelineSlot::Keys => &mut self.keys_file,
            PipelineSlot::Items => &mut self.items_file,
            PipelineSlot::Coverages => &mut self.coverages_file,
            PipelineSlot::GulSummaryXref => &mut self.gulsummaryxref_file,
        }
    }
}
