//! ONNX Runtime backend for the model loader.
//!
//! Loads a single `.onnx` classifier from a local path or downloads it from a
//! URL into the user cache directory first.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use doodletank_core::{Error, InputTensor, Result};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::ModelLocation;
use crate::model_loader::{ModelBackend, ModelHandle, ModelSession};

/// Loads ONNX classifiers with `ort`.
pub struct OnnxBackend {
    location: ModelLocation,
    cache_dir: PathBuf,
}

impl OnnxBackend {
    /// Create a backend for `location`, caching downloads under the user
    /// cache directory.
    pub fn new(location: ModelLocation) -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("doodletank")
            .join("models");

        Self {
            location,
            cache_dir,
        }
    }

    /// Override the download cache directory
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Resolve the model to a local file, downloading it if needed.
    async fn resolve_model_path(&self) -> Result<PathBuf> {
        match &self.location {
            ModelLocation::Local { path } => {
                if !path.exists() {
                    return Err(Error::model_load(format!(
                        "model file not found: {}",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
            ModelLocation::Url { url } => self.download(url).await,
        }
    }

    async fn download(&self, url: &str) -> Result<PathBuf> {
        let file_name = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("model.onnx");
        let target = self.cache_dir.join(file_name);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!(path = %target.display(), "using cached model");
            return Ok(target);
        }

        info!(%url, "downloading model");
        let response = reqwest::get(url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::model_load(format!("failed to download {url}: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::model_load(format!("failed to read {url}: {e}")))?;

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        // Write then rename so a partial download is never picked up as cached.
        let partial = target.with_extension("part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &target).await?;

        info!(path = %target.display(), bytes = bytes.len(), "model downloaded");
        Ok(target)
    }
}

#[async_trait]
impl ModelBackend for OnnxBackend {
    async fn load(&self) -> Result<ModelHandle> {
        let path = self.resolve_model_path().await?;

        let session = tokio::task::spawn_blocking(move || build_session(&path))
            .await
            .map_err(|e| Error::internal(format!("model load task failed: {e}")))??;

        Ok(Arc::new(session))
    }

    fn describe(&self) -> String {
        self.location.to_string()
    }
}

fn build_session(path: &Path) -> Result<OnnxSession> {
    let session = Session::builder()
        .map_err(|e| Error::model_load(format!("failed to create ONNX session: {e}")))?
        .commit_from_file(path)
        .map_err(|e| Error::model_load(format!("failed to load {}: {e}", path.display())))?;

    let input_names: Vec<String> = session
        .inputs()
        .iter()
        .map(|input| input.name().to_string())
        .collect();
    let output_count = session.outputs().len();

    info!(
        model = %path.display(),
        inputs = ?input_names,
        outputs = output_count,
        "initialized ONNX session"
    );

    Ok(OnnxSession {
        session: Arc::new(Mutex::new(session)),
        input_names,
        output_count,
    })
}

/// An `ort` session behind a mutex; forward passes on one session are
/// serialized.
pub struct OnnxSession {
    session: Arc<Mutex<Session>>,
    input_names: Vec<String>,
    output_count: usize,
}

#[async_trait]
impl ModelSession for OnnxSession {
    fn input_names(&self) -> Vec<String> {
        self.input_names.clone()
    }

    async fn run(&self, input_name: &str, tensor: InputTensor) -> Result<Vec<f32>> {
        if self.output_count == 0 {
            return Err(Error::inference("model declares no outputs"));
        }

        let session = Arc::clone(&self.session);
        let input_name = input_name.to_string();

        tokio::task::spawn_blocking(move || {
            let shape = InputTensor::SHAPE.map(|d| d as i64);
            let value = Tensor::from_array((shape, tensor.into_vec().into_boxed_slice()))
                .map_err(|e| Error::inference(format!("failed to build input tensor: {e}")))?;

            let mut session = session.lock();
            let outputs = session
                .run(ort::inputs![input_name.as_str() => value])
                .map_err(|e| Error::inference(format!("forward pass failed: {e}")))?;

            let (_shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::inference(format!("output is not an f32 tensor: {e}")))?;
            Ok(data.to_vec())
        })
        .await
        .map_err(|e| Error::internal(format!("inference task failed: {e}")))?
    }
}
