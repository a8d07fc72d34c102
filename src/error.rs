use crate::files::PipelineSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    Validation,
    Configuration,
    Transformation,
    LookupService,
    Io,
    Cancelled,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PipelineError {
    pub kind: PipelineErrorKind,
    pub message: String,
    pub slot: Option<PipelineSlot>,
}

impl PipelineError {
    pub fn new(kind: PipelineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            slot: None,
        }
    }

    /// Attaches the pipeline slot whose stage raised the error, keeping any slot already set.
    pub fn with_slot(mut self, slot: PipelineSlot) -> Self {
        if self.slot.is_none() {
            self.slot = Some(slot);
        }
        self
    }
}

pub fn validation_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Validation, message)
}

pub fn configuration_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Configuration, message)
}

pub fn transformation_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Transformation, message)
}

pub fn lookup_service_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::LookupService, message)
}

pub fn io_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Io, message)
}

pub fn cancelled(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Cancelled, message)
}

pub fn internal_error(message: impl Into<String>) -> PipelineError {
    PipelineError::new(PipelineErrorKind::Internal, message)
}
