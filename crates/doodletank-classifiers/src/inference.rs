//! Inference runner: one forward pass, one raw logit

use doodletank_core::{Error, InputTensor, Result};
use tracing::trace;

use crate::config::DEFAULT_INPUT_NAME;
use crate::model_loader::{ModelHandle, ModelLoader};

/// Runs the shared model on preprocessed input.
#[derive(Clone)]
pub struct InferenceRunner {
    loader: ModelLoader,
    fallback_input_name: String,
}

impl InferenceRunner {
    pub fn new(loader: ModelLoader) -> Self {
        Self {
            loader,
            fallback_input_name: DEFAULT_INPUT_NAME.to_string(),
        }
    }

    /// Input name to bind when the model declares none
    pub fn with_fallback_input_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_input_name = name.into();
        self
    }

    pub fn loader(&self) -> &ModelLoader {
        &self.loader
    }

    /// Run the model, loading it first if needed, and return the raw logit.
    pub async fn run(&self, tensor: InputTensor) -> Result<f32> {
        let model = self.loader.acquire().await?;
        self.forward(&model, tensor).await
    }

    /// Run only if the model is already loaded.
    ///
    /// Returns [`Error::InferenceUnavailable`] instead of triggering a load.
    pub async fn run_if_loaded(&self, tensor: InputTensor) -> Result<f32> {
        let model = self.loader.get().ok_or_else(|| {
            Error::inference_unavailable(format!("model {} is not loaded", self.loader.describe()))
        })?;
        self.forward(&model, tensor).await
    }

    async fn forward(&self, model: &ModelHandle, tensor: InputTensor) -> Result<f32> {
        let input_name = model
            .input_names()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.fallback_input_name.clone());

        let output = model.run(&input_name, tensor).await?;
        let logit = *output
            .first()
            .ok_or_else(|| Error::inference("model produced an empty output"))?;

        if logit.is_nan() {
            return Err(Error::inference("model produced a NaN logit"));
        }

        trace!(%input_name, logit, "forward pass complete");
        Ok(logit)
    }
}
