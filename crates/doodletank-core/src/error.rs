//! Error types for Doodletank

/// Result type alias using Doodletank's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Doodletank operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The model resource could not be fetched or initialized
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// A classification was requested but no model runtime is available
    #[error("inference unavailable: {0}")]
    InferenceUnavailable(String),

    /// The model ran but failed or produced malformed output
    #[error("inference error: {0}")]
    Inference(String),

    /// Invalid pixel buffer or undecodable image
    #[error("image error: {0}")]
    Image(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Gallery upload errors
    #[error("upload error: {0}")]
    Upload(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference-unavailable error
    pub fn inference_unavailable(msg: impl Into<String>) -> Self {
        Self::InferenceUnavailable(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new image error
    pub fn image(msg: impl Into<String>) -> Self {
        Self::Image(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new upload error
    pub fn upload(msg: impl Into<String>) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the error means no decision could be produced by the model.
    ///
    /// Callers on the stroke-check path treat these as "assume positive".
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelLoad(_) | Self::InferenceUnavailable(_))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}
