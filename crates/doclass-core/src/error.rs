//! Error types for doclass

/// Result type alias using doclass's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for doclass operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The classifier context never reached the ready state
    #[error("model not loaded; required files: {}", required_files.join(", "))]
    ModelNotLoaded {
        /// Artifact files that must be present for the model to load
        required_files: Vec<String>,
    },

    /// Text extraction, OCR, or page rendering errors
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Tensor preparation or forward pass errors
    #[error("inference error: {0}")]
    Inference(String),

    /// Artifact loading errors (weights, label map, tokenizer)
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a new model-not-loaded error naming the required artifact files
    pub fn model_not_loaded<I, S>(required_files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ModelNotLoaded {
            required_files: required_files.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a new extraction error
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the model was never loaded
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::ModelNotLoaded { .. })
    }
}
