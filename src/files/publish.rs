use std::{
    fs,
    path::{Path, PathBuf},
};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{PipelineError, cancelled, internal_error, io_error, transformation_error};

/// A file can back a pipeline slot only if it exists, is a regular file and is non-empty.
pub fn is_trusted_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| metadata.is_file() && metadata.len() > 0)
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> Result<PathBuf, PipelineError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent).map_err(|err| {
        io_error(format!(
            "failed to create output directory '{}': {err}",
            parent.display()
        ))
    })?;
    Ok(parent)
}

/// Writes `target` through a temporary sibling file and renames it into place
/// only once `produce` succeeded and left a non-empty file behind.
///
/// On any failure, including cancellation, the temporary file is removed and
/// `target` is left untouched. Returns the published file size in bytes.
pub fn publish_atomically<F>(
    target: &Path,
    cancel: &CancellationToken,
    produce: F,
) -> Result<u64, PipelineError>
where
    F: FnOnce(&Path) -> Result<(), PipelineError>,
{
    let parent = ensure_parent_dir(target)?;
    let file_name = target
        .file_name()
        .ok_or_else(|| internal_error(format!("output path '{}' has no file name", target.display())))?
        .to_string_lossy()
        .into_owned();
    let tmp_path = parent.join(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

    let result = publish_from_tmp(target, &tmp_path, &parent, cancel, produce);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn publish_from_tmp<F>(
    target: &Path,
    tmp_path: &Path,
    parent: &Path,
    cancel: &CancellationToken,
    produce: F,
) -> Result<u64, PipelineError>
where
    F: FnOnce(&Path) -> Result<(), PipelineError>,
{
    if cancel.is_cancelled() {
        return Err(cancelled(format!(
            "cancelled before writing '{}'",
            target.display()
        )));
    }

    produce(tmp_path)?;

    if cancel.is_cancelled() {
        return Err(cancelled(format!(
            "cancelled before publishing '{}'",
            target.display()
        )));
    }

    let metadata = fs::metadata(tmp_path).map_err(|err| {
        transformation_error(format!(
            "stage produced no output for '{}': {err}",
            target.display()
        ))
    })?;
    if metadata.len() == 0 {
        return Err(transformation_error(format!(
            "stage produced an empty output for '{}'",
            target.display()
        )));
    }

    let tmp_file = fs::OpenOptions::new()
        .read(true)
        .open(tmp_path)
        .map_err(|err| {
            io_error(format!(
                "failed to reopen temp file '{}': {err}",
                tmp_path.display()
            ))
        })?;
    tmp_file.sync_all().map_err(|err| {
        io_error(format!(
            "failed to sync temp file '{}': {err}",
            tmp_path.display()
        ))
    })?;

    fs::rename(tmp_path, target).map_err(|err| {
        io_error(format!(
            "failed to publish '{}' from '{}': {err}",
            target.display(),
            tmp_path.display()
        ))
    })?;

    if let Ok(parent_file) = fs::File::open(parent) {
        let _ = parent_file.sync_all();
    }

    Ok(metadata.len())
}
