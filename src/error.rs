//! Errors raised by the screening pipeline.

/// Failure modes of artifact loading and of a single pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum ScreeningError {
    /// The model artifact is missing, unreadable or malformed. Fatal at startup.
    #[error("failed to load model artifact: {0}")]
    ArtifactLoad(String),

    /// A categorical value that the fitted encoder never saw during training.
    #[error("unknown category {value:?} for field {field}")]
    UnknownCategory { field: String, value: String },

    /// The artifact declares a feature the prepared record does not provide.
    #[error("missing feature: {0}")]
    MissingFeature(String),

    #[error("feature vector has {actual} values, artifact expects {expected}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("feature {position} is {actual:?}, artifact expects {expected:?}")]
    FeatureOrderMismatch {
        position: usize,
        expected: String,
        actual: String,
    },
}

impl ScreeningError {
    pub(crate) fn artifact(reason: impl Into<String>) -> Self {
        Self::ArtifactLoad(reason.into())
    }
}

pub type Result<T> = std::result::Result<T, ScreeningError>;
