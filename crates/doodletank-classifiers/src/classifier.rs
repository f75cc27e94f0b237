//! Classifier trait and the doodle classifier

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use doodletank_core::{ClassificationResult, ImageSurface, Result};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::SubjectConfig;
use crate::inference::InferenceRunner;
use crate::model_loader::ModelLoader;
use crate::policy::ClassificationPolicy;
use crate::preprocess::preprocess;

/// Trait for sketch classifiers
#[async_trait]
pub trait SketchClassifier: Send + Sync {
    /// Classify a sketch, surfacing any failure.
    async fn try_classify(&self, surface: &ImageSurface) -> Result<ClassificationResult>;

    /// Subject this classifier looks for, e.g. `fish`
    fn subject(&self) -> &str;

    /// Classify a sketch, never failing.
    ///
    /// Any error yields [`ClassificationResult::fail_open`]: an unavailable
    /// classifier must not stop anyone from drawing or submitting.
    async fn classify(&self, surface: &ImageSurface) -> ClassificationResult {
        match self.try_classify(surface).await {
            Ok(result) => {
                let outcome = if result.is_target_class { "pass" } else { "flag" };
                metrics::counter!("doodletank_classifications_total", "outcome" => outcome)
                    .increment(1);
                result
            }
            Err(e) => {
                warn!(subject = %self.subject(), error = %e, "classification failed, assuming pass");
                metrics::counter!("doodletank_classifications_total", "outcome" => "fallback")
                    .increment(1);
                ClassificationResult::fail_open()
            }
        }
    }
}

/// Model-backed classifier for one subject
pub struct DoodleClassifier {
    subject: String,
    runner: InferenceRunner,
    policy: ClassificationPolicy,
}

impl DoodleClassifier {
    /// Build a classifier around an existing loader.
    pub fn new(config: &SubjectConfig, loader: ModelLoader) -> Result<Self> {
        config.validate()?;
        let policy = ClassificationPolicy::new(config.threshold)?;
        let runner =
            InferenceRunner::new(loader).with_fallback_input_name(&config.fallback_input_name);

        Ok(Self {
            subject: config.subject.clone(),
            runner,
            policy,
        })
    }

    /// Build a classifier backed by ONNX Runtime.
    #[cfg(feature = "onnx")]
    pub fn from_config(config: &SubjectConfig) -> Result<Self> {
        let backend = crate::onnx::OnnxBackend::new(config.model.clone());
        Self::new(config, ModelLoader::new(Arc::new(backend)))
    }

    pub fn loader(&self) -> &ModelLoader {
        self.runner.loader()
    }

    pub fn policy(&self) -> &ClassificationPolicy {
        &self.policy
    }

    /// Start the best-effort background model load.
    pub fn preload(&self) -> JoinHandle<()> {
        self.loader().preload()
    }

    /// Shared, type-erased handle for consumers such as the stroke monitor
    pub fn into_shared(self) -> Arc<dyn SketchClassifier> {
        Arc::new(self)
    }
}

#[async_trait]
impl SketchClassifier for DoodleClassifier {
    async fn try_classify(&self, surface: &ImageSurface) -> Result<ClassificationResult> {
        let start = Instant::now();

        let tensor = preprocess(surface);
        let logit = self.runner.run(tensor).await?;
        let result = self.policy.decide(logit);

        let latency_us = start.elapsed().as_micros() as u64;
        metrics::histogram!("doodletank_classification_latency_us").record(latency_us as f64);
        debug!(
            subject = %self.subject,
            logit,
            percent = result.probability_percent,
            is_target = result.is_target_class,
            latency_us,
            "sketch classified"
        );

        Ok(result.with_latency_us(latency_us))
    }

    fn subject(&self) -> &str {
        &self.subject
    }
}
