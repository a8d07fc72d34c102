use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use time::{OffsetDateTime, macros::format_description};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PipelineError, internal_error, io_error, transformation_error, validation_error},
    exposures::{
        oasis_files::{self, OasisRow, build_oasis_rows, write_oasis_file},
        ports::ExposuresManagerPort,
        profile::CanonicalProfile,
        types::{GenerateOverrides, KeysReport, ManagerSettings, OasisFilesReport, StageOutcome},
    },
    files::{
        ExposureTable, FilesPipelinePersistence, PipelineSlot, is_trusted_file, publish_atomically,
    },
    keys::{KeysLookupFactory, KeysSummary, read_keys_file, summarize_keys_file, write_keys_file},
    model::{
        Model, ModelKey, ModelRegistry, ResourceValue, SharedModel,
        resources::{
            CANONICAL_EXPOSURES_PROFILE, CANONICAL_EXPOSURES_PROFILE_JSON,
            CANONICAL_EXPOSURES_PROFILE_JSON_PATH, CANONICAL_TO_MODEL_TRANSFORM,
            EXPOSURE_ID_COLUMN, OASIS_FILES_PATH, SOURCE_EXPOSURES_FILE_PATH,
            SOURCE_TO_CANONICAL_TRANSFORM,
        },
    },
    transforms::resolve_transform,
};

/// Drives models' files pipelines stage by stage.
///
/// Stage methods are blocking; run them on worker threads when processing
/// several models at once. The registry is only locked to resolve a model,
/// never while a stage runs.
pub struct ExposuresManager {
    settings: ManagerSettings,
    registry: Arc<ModelRegistry>,
    keys_lookup_factory: KeysLookupFactory,
    cancel: CancellationToken,
}

impl ExposuresManager {
    pub fn new(settings: ManagerSettings, registry: Arc<ModelRegistry>) -> Self {
        Self {
            settings,
            registry,
            keys_lookup_factory: KeysLookupFactory::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_keys_lookup_factory(mut self, factory: KeysLookupFactory) -> Self {
        self.keys_lookup_factory = factory;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn keys_lookup_factory(&self) -> &KeysLookupFactory {
        &self.keys_lookup_factory
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The `oasis_files_path` resource, else `<files_root>/<supplier>-<model>-<version>`.
    pub fn output_dir(&self, model: &Model) -> PathBuf {
        match model.resource(OASIS_FILES_PATH) {
            Some(ResourceValue::Path(path)) => path.clone(),
            Some(ResourceValue::Text(text)) => PathBuf::from(text),
            _ => self.settings.files_root.join(model.key().dir_name()),
        }
    }

    pub fn add_model(&self, mut model: Model) -> Result<SharedModel, PipelineError> {
        self.prepare_model(&mut model)?;
        let key = model.key().clone();
        let shared = self.registry.register(model)?;
        tracing::info!(target: "exposures", model_key = %key, "model_added");
        Ok(shared)
    }

    pub fn update_model(&self, mut model: Model) -> Result<SharedModel, PipelineError> {
        self.prepare_model(&mut model)?;
        let key = model.key().clone();
        let shared = self.registry.upsert(model);
        tracing::info!(target: "exposures", model_key = %key, "model_updated");
        Ok(shared)
    }

    pub fn delete_model(&self, key: &ModelKey) -> Result<Option<SharedModel>, PipelineError> {
        let Some(shared) = self.registry.resolve(key) else {
            return Ok(None);
        };
        {
            let mut model = shared
                .lock()
                .map_err(|_| internal_error(format!("model '{key}' lock poisoned")))?;
            self.clear_files_pipeline(&mut model);
        }
        let removed = self.registry.unregister(key);
        tracing::info!(target: "exposures", model_key = %key, "model_deleted");
        Ok(removed)
    }

    pub fn model(&self, key: &ModelKey) -> Option<SharedModel> {
        self.registry.resolve(key)
    }

    pub fn models(&self) -> Vec<ModelKey> {
        self.registry.keys()
    }

    pub fn generate_oasis_files_for(
        &self,
        key: &ModelKey,
        overrides: GenerateOverrides,
    ) -> Result<OasisFilesReport, PipelineError> {
        self.with_model(key, |model| self.generate_oasis_files(model, overrides))
    }

    pub fn start_files_pipeline_for(
        &self,
        key: &ModelKey,
        overrides: GenerateOverrides,
    ) -> Result<OasisFilesReport, PipelineError> {
        self.with_model(key, |model| self.start_files_pipeline(model, overrides))
    }

    pub fn persistence_for(&self, key: &ModelKey) -> FilesPipelinePersistence {
        FilesPipelinePersistence::for_model(&self.settings.state_dir, key)
    }

    /// Persists the model's pipeline under the state directory.
    pub fn save_state(&self, key: &ModelKey) -> Result<PathBuf, PipelineError> {
        let persistence = self.persistence_for(key);
        self.with_model(key, |model| self.save_files_pipeline(model, persistence.path()))?;
        Ok(persistence.path().clone())
    }

    /// Restores a previously saved pipeline; `false` when none was saved.
    pub fn restore_state(&self, key: &ModelKey) -> Result<bool, PipelineError> {
        let persistence = self.persistence_for(key);
        if !persistence.exists() {
            return Ok(false);
        }
        self.with_model(key, |model| {
            self.restore_files_pipeline(model, persistence.path())
        })?;
        Ok(true)
    }

    fn with_model<T>(
        &self,
        key: &ModelKey,
        f: impl FnOnce(&mut Model) -> Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        let shared = self
            .registry
            .resolve(key)
            .ok_or_else(|| validation_error(format!("unknown model '{key}'")))?;
        let mut model = shared
            .lock()
            .map_err(|_| internal_error(format!("model '{key}' lock poisoned")))?;
        f(&mut model)
    }

    fn prepare_model(&self, model: &mut Model) -> Result<(), PipelineError> {
        let output_dir = self.output_dir(model);
        fs::create_dir_all(&output_dir).map_err(|err| {
            io_error(format!(
                "failed to create output directory '{}' for {model}: {err}",
                output_dir.display()
            ))
        })?;
        self.sync_source(model);
        if CanonicalProfile::has_source(&model.resources) {
            self.load_canonical_profile(model)?;
        }
        Ok(())
    }

    fn skip_if_trusted(&self, model: &Model, slot: PipelineSlot, force: bool) -> Option<StageOutcome> {
        if force {
            return None;
        }
        let path = trusted_output(model, slot)?;
        tracing::debug!(
            target: "exposures",
            model_key = %model.key(),
            slot = %slot,
            path = %path.display(),
            "stage_skipped"
        );
        Some(StageOutcome::Skipped { path })
    }

    fn publish_stage<F>(
        &self,
        model: &mut Model,
        slot: PipelineSlot,
        file_name: &str,
        produce: F,
    ) -> Result<StageOutcome, PipelineError>
    where
        F: FnOnce(&Path) -> Result<u64, PipelineError>,
    {
        let target = self.output_dir(model).join(file_name);
        let mut rows = 0_u64;
        publish_atomically(&target, &self.cancel, |tmp_path| {
            rows = produce(tmp_path)?;
            Ok(())
        })?;

        model.files_pipeline_mut().record_output(slot, target.clone());
        tracing::info!(
            target: "exposures",
            model_key = %model.key(),
            slot = %slot,
            rows = rows,
            path = %target.display(),
            "stage_completed"
        );
        Ok(StageOutcome::Executed { path: target, rows })
    }

    fn transform_stage(
        &self,
        model: &mut Model,
        input: PipelineSlot,
        output: PipelineSlot,
        resource_key: &str,
        file_prefix: &str,
        force: bool,
    ) -> Result<StageOutcome, PipelineError> {
        if let Some(outcome) = self.skip_if_trusted(model, output, force) {
            return Ok(outcome);
        }
        let input_path = require_input(model, input, output)?;
        let transform = resolve_transform(&model.resources, resource_key)?;
        let file_name = format!("{file_prefix}-{}.csv", utc_timestamp()?);
        tracing::debug!(
            target: "exposures",
            model_key = %model.key(),
            transform = transform.name(),
            input = %input_path.display(),
            "transform_started"
        );
        self.publish_stage(model, output, &file_name, |tmp_path| {
            transform.apply(&input_path, tmp_path, &self.cancel)
        })
    }

    fn keys_stage(&self, model: &mut Model, force: bool) -> Result<KeysReport, PipelineError> {
        if let Some(outcome) = self.skip_if_trusted(model, PipelineSlot::Keys, force) {
            let summary = summarize_keys_file(outcome.path())?;
            return Ok(KeysReport { outcome, summary });
        }

        let exposures = require_input(model, PipelineSlot::ModelExposures, PipelineSlot::Keys)?;
        let service = self.keys_lookup_factory.create(model)?;
        let records = service.get_keys(&exposures)?;
        let summary = KeysSummary::from_records(&records);

        let file_name = format!("oasiskeys-{}.csv", utc_timestamp()?);
        let outcome = self.publish_stage(model, PipelineSlot::Keys, &file_name, |tmp_path| {
            write_keys_file(tmp_path, &records, &self.cancel)?;
            Ok(records.len() as u64)
        })?;
        tracing::info!(
            target: "exposures",
            model_key = %model.key(),
            service = service.name(),
            matched = summary.matched,
            unmatched = summary.unmatched,
            "keys_generated"
        );
        Ok(KeysReport { outcome, summary })
    }

    /// Items, coverages and summary xref rows derived from the current keys file.
    fn oasis_rows(&self, model: &Model, stage: PipelineSlot) -> Result<Vec<OasisRow>, PipelineError> {
        let keys_path = require_input(model, PipelineSlot::Keys, stage)?;
        let model_exposures = require_input(model, PipelineSlot::ModelExposures, stage)?;
        let exposures_path =
            trusted_output(model, PipelineSlot::CanonicalExposures).unwrap_or(model_exposures);

        let profile = CanonicalProfile::from_resources(&model.resources)?;
        let keys = read_keys_file(&keys_path)?;
        let exposures = ExposureTable::read(&exposures_path)?;
        let id_column = model
            .resource(EXPOSURE_ID_COLUMN)
            .and_then(ResourceValue::as_text)
            .unwrap_or(&self.settings.exposure_id_column);

        build_oasis_rows(&keys, &exposures, id_column, &profile, &self.cancel)
    }

    fn oasis_stage(
        &self,
        model: &mut Model,
        slot: PipelineSlot,
        rows: &[OasisRow],
    ) -> Result<StageOutcome, PipelineError> {
        let file_name = oasis_files::file_name(slot)
            .ok_or_else(|| internal_error(format!("{slot} is not an Oasis file")))?;
        let outcome = self.publish_stage(model, slot, file_name, |tmp_path| {
            write_oasis_file(slot, tmp_path, rows)
        })?;

        let archive_name = oasis_files::timestamped_file_name(slot, &utc_timestamp()?)
            .ok_or_else(|| internal_error(format!("{slot} is not an Oasis file")))?;
        let archive = self.output_dir(model).join(archive_name);
        publish_atomically(&archive, &self.cancel, |tmp_path| {
            write_oasis_file(slot, tmp_path, rows).map(|_| ())
        })?;
        tracing::debug!(
            target: "exposures",
            model_key = %model.key(),
            slot = %slot,
            path = %archive.display(),
            "oasis_file_archived"
        );
        Ok(outcome)
    }

    /// Points the source slot at the `source_exposures_file_path` resource.
    ///
    /// A resource naming another file than the recorded one, other than its
    /// staged copy in the output directory, clears every derived slot.
    fn sync_source(&self, model: &mut Model) {
        let Some(source) = model
            .resource(SOURCE_EXPOSURES_FILE_PATH)
            .and_then(ResourceValue::as_path)
            .map(Path::to_path_buf)
        else {
            return;
        };
        let staged = self.staged_source_path(model, &source);
        let current = model.files_pipeline().slot(PipelineSlot::SourceExposures);
        if current == Some(source.as_path()) || (current.is_some() && current == staged.as_deref())
        {
            return;
        }

        if let Some(previous) = current {
            tracing::info!(
                target: "exposures",
                model_key = %model.key(),
                previous = %previous.display(),
                source = %source.display(),
                "source_exposures_changed"
            );
        }
        model
            .files_pipeline_mut()
            .record_output(PipelineSlot::SourceExposures, source);
    }

    fn staged_source_path(&self, model: &Model, source: &Path) -> Option<PathBuf> {
        source
            .file_name()
            .map(|name| self.output_dir(model).join(name))
    }

    /// Copies the run's source exposures file into the model's output
    /// directory and makes the copy the source override.
    fn stage_source_file(
        &self,
        model: &Model,
        files: &mut BTreeMap<PipelineSlot, PathBuf>,
    ) -> Result<(), PipelineError> {
        let source = match files.get(&PipelineSlot::SourceExposures) {
            Some(path) => path.clone(),
            None => match model
                .resource(SOURCE_EXPOSURES_FILE_PATH)
                .and_then(ResourceValue::as_path)
            {
                Some(path) => path.to_path_buf(),
                None => return Ok(()),
            },
        };
        let staged = self.staged_source_path(model, &source).ok_or_else(|| {
            validation_error(format!(
                "source exposures path '{}' has no file name",
                source.display()
            ))
            .with_slot(PipelineSlot::SourceExposures)
        })?;

        if staged != source {
            if !is_trusted_file(&source) {
                return Err(transformation_error(format!(
                    "source exposures file '{}' of {model} is missing or empty",
                    source.display()
                ))
                .with_slot(PipelineSlot::SourceExposures));
            }
            let bytes = publish_atomically(&staged, &self.cancel, |tmp_path| {
                fs::copy(&source, tmp_path).map(|_| ()).map_err(|err| {
                    io_error(format!(
                        "failed to copy source exposures '{}': {err}",
                        source.display()
                    ))
                })
            })
            .map_err(|err| err.with_slot(PipelineSlot::SourceExposures))?;
            tracing::info!(
                target: "exposures",
                model_key = %model.key(),
                source = %source.display(),
                path = %staged.display(),
                bytes = bytes,
                "source_exposures_staged"
            );
        }

        files.insert(PipelineSlot::SourceExposures, staged);
        Ok(())
    }

    fn generate_oasis_file(
        &self,
        model: &mut Model,
        slot: PipelineSlot,
        force: bool,
    ) -> Result<StageOutcome, PipelineError> {
        if let Some(outcome) = self.skip_if_trusted(model, slot, force) {
            return Ok(outcome);
        }
        let rows = self.oasis_rows(model, slot)?;
        self.oasis_stage(model, slot, &rows)
    }

    /// Points `slot` at a caller-supplied file after checking it is usable.
    fn adopt_override(
        &self,
        model: &mut Model,
        slot: PipelineSlot,
        path: &Path,
    ) -> Result<StageOutcome, PipelineError> {
        if !is_trusted_file(path) {
            return Err(transformation_error(format!(
                "override for {slot} '{}' is missing or empty",
                path.display()
            ))
            .with_slot(slot));
        }
        if model.files_pipeline().slot(slot) != Some(path) {
            model
                .files_pipeline_mut()
                .record_output(slot, path.to_path_buf());
        }
        tracing::debug!(
            target: "exposures",
            model_key = %model.key(),
            slot = %slot,
            path = %path.display(),
            "override_adopted"
        );
        Ok(StageOutcome::Skipped {
            path: path.to_path_buf(),
        })
    }

    fn adopt_or_run(
        &self,
        model: &mut Model,
        files: &BTreeMap<PipelineSlot, PathBuf>,
        slot: PipelineSlot,
        report: &mut OasisFilesReport,
        run: impl FnOnce(&mut Model) -> Result<Option<StageOutcome>, PipelineError>,
    ) -> Result<(), PipelineError> {
        let outcome = match files.get(&slot) {
            Some(path) => Some(self.adopt_override(model, slot, path)?),
            None => run(model)?,
        };
        if let Some(outcome) = outcome {
            report.record(slot, &outcome);
        }
        Ok(())
    }

    fn drive(
        &self,
        model: &mut Model,
        files: &BTreeMap<PipelineSlot, PathBuf>,
        force: bool,
        report: &mut OasisFilesReport,
    ) -> Result<(), PipelineError> {
        match files.get(&PipelineSlot::SourceExposures) {
            Some(path) => {
                self.adopt_override(model, PipelineSlot::SourceExposures, path)?;
            }
            None => self.sync_source(model),
        }

        let plan = StagePlan::new(model, files, force);
        tracing::debug!(
            target: "exposures",
            model_key = %model.key(),
            canonical = plan.canonical,
            model_exposures = plan.model_exposures,
            keys = plan.keys,
            "stage_plan"
        );

        self.adopt_or_run(model, files, PipelineSlot::CanonicalExposures, report, |model| {
            if plan.canonical {
                self.transform_source_to_canonical(model, force).map(Some)
            } else {
                Ok(self.unneeded_stage(model, PipelineSlot::CanonicalExposures))
            }
        })?;
        self.adopt_or_run(model, files, PipelineSlot::ModelExposures, report, |model| {
            if plan.model_exposures {
                self.transform_canonical_to_model(model, force).map(Some)
            } else {
                Ok(self.unneeded_stage(model, PipelineSlot::ModelExposures))
            }
        })?;

        match files.get(&PipelineSlot::Keys) {
            Some(path) => {
                let outcome = self.adopt_override(model, PipelineSlot::Keys, path)?;
                let summary = summarize_keys_file(path)
                    .map_err(|err| err.with_slot(PipelineSlot::Keys))?;
                report.keys = Some(summary);
                report.record(PipelineSlot::Keys, &outcome);
            }
            None if plan.keys || trusted_output(model, PipelineSlot::Keys).is_some() => {
                let keys = self.get_keys(model, force && plan.keys)?;
                report.keys = Some(keys.summary);
                report.record(PipelineSlot::Keys, &keys.outcome);
            }
            None => {
                self.unneeded_stage(model, PipelineSlot::Keys);
            }
        }

        let pending = PipelineSlot::OASIS_FILES
            .into_iter()
            .filter(|slot| !files.contains_key(slot))
            .filter(|slot| force || trusted_output(model, *slot).is_none())
            .collect::<Vec<_>>();
        let rows = match pending.first() {
            Some(first) => self
                .oasis_rows(model, *first)
                .map_err(|err| err.with_slot(*first))?,
            None => Vec::new(),
        };

        for slot in PipelineSlot::OASIS_FILES {
            self.adopt_or_run(model, files, slot, report, |model| {
                if pending.contains(&slot) {
                    self.oasis_stage(model, slot, &rows)
                        .map(Some)
                        .map_err(|err| err.with_slot(slot))
                } else {
                    self.skip_if_trusted(model, slot, false).map(Some).ok_or_else(|| {
                        internal_error(format!("{slot} is neither pending nor usable"))
                    })
                }
            })?;
        }

        Ok(())
    }

    /// Reports a stage the run does not need: skipped when its output is
    /// usable, otherwise left out of the report.
    fn unneeded_stage(&self, model: &Model, slot: PipelineSlot) -> Option<StageOutcome> {
        let outcome = self.skip_if_trusted(model, slot, false);
        if outcome.is_none() {
            tracing::debug!(
                target: "exposures",
                model_key = %model.key(),
                slot = %slot,
                "stage_not_needed"
            );
        }
        outcome
    }

    fn run_pipeline(
        &self,
        model: &mut Model,
        overrides: GenerateOverrides,
        stage_source: bool,
    ) -> Result<OasisFilesReport, PipelineError> {
        let GenerateOverrides {
            mut files,
            resources,
            force,
        } = overrides;

        let reload_profile = resources.contains_key(CANONICAL_EXPOSURES_PROFILE_JSON)
            || resources.contains_key(CANONICAL_EXPOSURES_PROFILE_JSON_PATH);
        if let Some(path) = resources
            .get(SOURCE_EXPOSURES_FILE_PATH)
            .and_then(ResourceValue::as_path)
        {
            files
                .entry(PipelineSlot::SourceExposures)
                .or_insert_with(|| path.to_path_buf());
        }
        for (name, value) in resources {
            model.set_resource(name, value);
        }
        if reload_profile {
            self.load_canonical_profile(model)?;
        }

        let mut report = OasisFilesReport::new(model.files_pipeline().clone());
        let staged = if stage_source {
            self.stage_source_file(model, &mut files)
        } else {
            Ok(())
        };
        let result = staged.and_then(|()| self.drive(model, &files, force, &mut report));
        report.files_pipeline = model.files_pipeline().clone();

        match result {
            Ok(()) => {
                tracing::info!(
                    target: "exposures",
                    model_key = %model.key(),
                    executed = report.executed.len(),
                    skipped = report.skipped.len(),
                    unmatched = report.unmatched(),
                    stage = ?report.files_pipeline.stage(),
                    "oasis_files_generated"
                );
                Ok(report)
            }
            Err(err) => {
                tracing::warn!(
                    target: "exposures",
                    model_key = %model.key(),
                    slot = ?err.slot,
                    kind = ?err.kind,
                    error = %err,
                    stage = ?report.files_pipeline.stage(),
                    "oasis_files_failed"
                );
                Err(err)
            }
        }
    }
}

/// Which producing stages a run executes.
///
/// Demand flows backwards from the Oasis files: a stage runs only when its
/// output is unavailable and a later stage that runs consumes it. Supplied
/// files count as available; a supplied file that replaces a recorded one
/// makes the recorded outputs after it unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StagePlan {
    canonical: bool,
    model_exposures: bool,
    keys: bool,
}

impl StagePlan {
    fn new(model: &Model, files: &BTreeMap<PipelineSlot, PathBuf>, force: bool) -> Self {
        let mut available = BTreeMap::new();
        let mut replaced_upstream = false;
        for slot in &PipelineSlot::ALL[1..] {
            let usable = match files.get(slot) {
                Some(path) => {
                    if model.files_pipeline().slot(*slot) != Some(path.as_path()) {
                        replaced_upstream = true;
                    }
                    true
                }
                None => !replaced_upstream && !force && trusted_output(model, *slot).is_some(),
            };
            available.insert(*slot, usable);
        }
        let is_available = |slot: PipelineSlot| available.get(&slot).copied().unwrap_or(false);

        let needs_rows = !PipelineSlot::OASIS_FILES.into_iter().all(is_available);
        let model_exposures = needs_rows && !is_available(PipelineSlot::ModelExposures);
        let canonical = model_exposures && !is_available(PipelineSlot::CanonicalExposures);
        // fresh model exposures invalidate a keys file that was not supplied
        let keys = needs_rows
            && (!is_available(PipelineSlot::Keys)
                || (model_exposures && !files.contains_key(&PipelineSlot::Keys)));

        Self {
            canonical,
            model_exposures,
            keys,
        }
    }
}

impl ExposuresManagerPort for ExposuresManager {
    #[tracing::instrument(
        name = "exposures_load_canonical_profile",
        target = "exposures",
        skip(self, model),
        fields(model_key = %model.key())
    )]
    fn load_canonical_profile(&self, model: &mut Model) -> Result<CanonicalProfile, PipelineError> {
        let profile = CanonicalProfile::from_resources(&model.resources)?;
        model.set_resource(
            CANONICAL_EXPOSURES_PROFILE,
            ResourceValue::Json(profile.to_json()),
        );
        tracing::debug!(
            target: "exposures",
            model_key = %model.key(),
            elements = profile.len(),
            tiv_fields = profile.tiv_columns().len(),
            "canonical_profile_loaded"
        );
        Ok(profile)
    }

    #[tracing::instrument(
        name = "exposures_transform_source_to_canonical",
        target = "exposures",
        skip(self, model),
        fields(model_key = %model.key())
    )]
    fn transform_source_to_canonical(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError> {
        self.transform_stage(
            model,
            PipelineSlot::SourceExposures,
            PipelineSlot::CanonicalExposures,
            SOURCE_TO_CANONICAL_TRANSFORM,
            "canexp",
            force,
        )
        .map_err(|err| err.with_slot(PipelineSlot::CanonicalExposures))
    }

    #[tracing::instrument(
        name = "exposures_transform_canonical_to_model",
        target = "exposures",
        skip(self, model),
        fields(model_key = %model.key())
    )]
    fn transform_canonical_to_model(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError> {
        self.transform_stage(
            model,
            PipelineSlot::CanonicalExposures,
            PipelineSlot::ModelExposures,
            CANONICAL_TO_MODEL_TRANSFORM,
            "modexp",
            force,
        )
        .map_err(|err| err.with_slot(PipelineSlot::ModelExposures))
    }

    #[tracing::instrument(
        name = "exposures_get_keys",
        target = "exposures",
        skip(self, model),
        fields(model_key = %model.key())
    )]
    fn get_keys(&self, model: &mut Model, force: bool) -> Result<KeysReport, PipelineError> {
        self.keys_stage(model, force)
            .map_err(|err| err.with_slot(PipelineSlot::Keys))
    }

    #[tracing::instrument(
        name = "exposures_generate_items_file",
        target = "exposures",
        skip(self, model),
        fields(model_key = %model.key())
    )]
    fn generate_items_file(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError> {
        self.generate_oasis_file(model, PipelineSlot::Items, force)
            .map_err(|err| err.with_slot(PipelineSlot::Items))
    }

    #[tracing::instrument(
        name = "exposures_generate_coverages_file",
        target = "exposures",
        skip(self, model),
        fields(model_key = %model.key())
    )]
    fn generate_coverages_file(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError> {
        self.generate_oasis_file(model, PipelineSlot::Coverages, force)
            .map_err(|err| err.with_slot(PipelineSlot::Coverages))
    }

    #[tracing::instrument(
        name = "exposures_generate_gulsummaryxref_file",
        target = "exposures",
        skip(self, model),
        fields(model_key = %model.key())
    )]
    fn generate_gulsummaryxref_file(
        &self,
        model: &mut Model,
        force: bool,
    ) -> Result<StageOutcome, PipelineError> {
        self.generate_oasis_file(model, PipelineSlot::GulSummaryXref, force)
            .map_err(|err| err.with_slot(PipelineSlot::GulSummaryXref))
    }

    #[tracing::instrument(
        name = "exposures_generate_oasis_files",
        target = "exposures",
        skip(self, model, overrides),
        fields(model_key = %model.key(), force = overrides.force)
    )]
    fn generate_oasis_files(
        &self,
        model: &mut Model,
        overrides: GenerateOverrides,
    ) -> Result<OasisFilesReport, PipelineError> {
        self.run_pipeline(model, overrides, false)
    }

    fn clear_files_pipeline(&self, model: &mut Model) {
        model.files_pipeline_mut().clear(&[]);
        tracing::debug!(target: "exposures", model_key = %model.key(), "files_pipeline_cleared");
    }

    fn save_files_pipeline(&self, model: &Model, path: &Path) -> Result<(), PipelineError> {
        FilesPipelinePersistence::new(path.to_path_buf()).save(model.files_pipeline())?;
        tracing::debug!(
            target: "exposures",
            model_key = %model.key(),
            path = %path.display(),
            "files_pipeline_saved"
        );
        Ok(())
    }

    fn restore_files_pipeline(&self, model: &mut Model, path: &Path) -> Result<(), PipelineError> {
        let pipeline = FilesPipelinePersistence::new(path.to_path_buf()).load()?;
        model.attach_files_pipeline(pipeline)?;
        self.sync_source(model);
        tracing::debug!(
            target: "exposures",
            model_key = %model.key(),
            path = %path.display(),
            stage = ?model.files_pipeline().stage(),
            "files_pipeline_restored"
        );
        Ok(())
    }

    #[tracing::instrument(
        name = "exposures_start_files_pipeline",
        target = "exposures",
        skip(self, model, overrides),
        fields(model_key = %model.key(), force = overrides.force)
    )]
    fn start_files_pipeline(
        &self,
        model: &mut Model,
        mut overrides: GenerateOverrides,
    ) -> Result<OasisFilesReport, PipelineError> {
        let previous_source = model
            .files_pipeline()
            .slot(PipelineSlot::SourceExposures)
            .map(Path::to_path_buf);
        self.clear_files_pipeline(model);

        let has_source_resource = model.resource(SOURCE_EXPOSURES_FILE_PATH).is_some()
            || overrides.resources.contains_key(SOURCE_EXPOSURES_FILE_PATH);
        if let Some(path) = previous_source.filter(|_| !has_source_resource) {
            overrides
                .files
                .entry(PipelineSlot::SourceExposures)
                .or_insert(path);
        }

        self.run_pipeline(model, overrides, true)
    }
}

fn trusted_output(model: &Model, slot: PipelineSlot) -> Option<PathBuf> {
    model
        .files_pipeline()
        .slot(slot)
        .filter(|path| is_trusted_file(path))
        .map(Path::to_path_buf)
}

fn require_input(
    model: &Model,
    input: PipelineSlot,
    stage: PipelineSlot,
) -> Result<PathBuf, PipelineError> {
    let path = model.files_pipeline().slot(input).ok_or_else(|| {
        transformation_error(format!(
            "producing {stage} needs {input}, which is not set for {model}"
        ))
    })?;
    if !is_trusted_file(path) {
        return Err(transformation_error(format!(
            "{input} '{}' of {model} is missing or empty",
            path.display()
        )));
    }
    Ok(path.to_path_buf())
}

fn utc_timestamp() -> Result<String, PipelineError> {
    OffsetDateTime::now_utc()
        .format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))
        .map_err(|err| internal_error(format!("failed to format timestamp: {err}")))
}
