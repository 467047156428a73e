use serde::{Serialize, Serializer};
use thiserror::Error;

/// Classified failure of a forecast run. Everything past feature synthesis
/// surfaces as one of these; nothing is swallowed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot build features: no data from {0}")]
    InsufficientData(String),

    #[error("Insufficient history for sequence. Need {required} timesteps, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    #[error("Feature mismatch. Model expects {expected} features, but got {actual}")]
    FeatureShapeMismatch { expected: usize, actual: usize },

    #[error("Forecasting model is not loaded. Service unavailable.")]
    ModelUnavailable,

    #[error("Model prediction failed: {0}")]
    Model(String),

    #[error("Feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Serialized as its `as_str` name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InsufficientData,
    InsufficientHistory,
    FeatureShapeMismatch,
    ModelUnavailable,
    Model,
    FeedUnavailable,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InsufficientData => "insufficient_data",
            ErrorKind::InsufficientHistory => "insufficient_history",
            ErrorKind::FeatureShapeMismatch => "feature_shape_mismatch",
            ErrorKind::ModelUnavailable => "model_unavailable",
            ErrorKind::Model => "model",
            ErrorKind::FeedUnavailable => "feed_unavailable",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InsufficientData(_) => ErrorKind::InsufficientData,
            PipelineError::InsufficientHistory { .. } => ErrorKind::InsufficientHistory,
            PipelineError::FeatureShapeMismatch { .. } => ErrorKind::FeatureShapeMismatch,
            PipelineError::ModelUnavailable => ErrorKind::ModelUnavailable,
            PipelineError::Model(_) => ErrorKind::Model,
            PipelineError::FeedUnavailable(_) => ErrorKind::FeedUnavailable,
            PipelineError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

/// The structured failure handed to whatever presents results (CLI, web layer).
#[derive(Debug, Clone, Serialize)]
pub struct PipelineFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PipelineError> for PipelineFailure {
    fn from(err: &PipelineError) -> Self {
        PipelineFailure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
