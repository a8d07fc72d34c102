use std::{
    io::Read,
    path::Path,
    process::{Command, Stdio},
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{PipelineError, cancelled, transformation_error},
    transforms::ports::ExposureTransform,
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const STDERR_EXCERPT_BYTES: usize = 2048;

/// Delegates to an external transformer executable.
///
/// `{input}` and `{output}` in `args` are replaced with the stage paths, e.g.
/// `["-d", "validation.xsd", "-c", "{input}", "-t", "transform.xslt", "-o", "{output}"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandTransform {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTransform {
    fn render_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{input}", input.as_ref())
                    .replace("{output}", output.as_ref())
            })
            .collect()
    }
}

impl ExposureTransform for CommandTransform {
    fn name(&self) -> &str {
        &self.program
    }

    fn apply(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, PipelineError> {
        if self.program.trim().is_empty() {
            return Err(transformation_error("command transform has no program"));
        }

        let mut child = Command::new(&self.program)
            .args(self.render_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                transformation_error(format!("failed to spawn '{}': {err}", self.program))
            })?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        let status = loop {
            if cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(cancelled(format!("'{}' cancelled", self.program)));
            }
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    return Err(transformation_error(format!(
                        "failed to wait for '{}': {err}",
                        self.program
                    )));
                }
            }
        };

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            let excerpt = String::from_utf8_lossy(&stderr[..stderr.len().min(STDERR_EXCERPT_BYTES)])
                .trim()
                .to_string();
            return Err(transformation_error(format!(
                "'{}' exited with code {exit_code}: {excerpt}",
                self.program
            )));
        }

        count_data_rows(output)
    }
}

fn count_data_rows(path: &Path) -> Result<u64, PipelineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| {
        transformation_error(format!(
            "transformer output '{}' is unreadable: {err}",
            path.display()
        ))
    })?;
    let mut rows = 0_u64;
    for record in reader.records() {
        record.map_err(|err| {
            transformation_error(format!(
                "transformer output '{}' is malformed: {err}",
                path.display()
            ))
        })?;
        rows += 1;
    }
    Ok(rows)
}
