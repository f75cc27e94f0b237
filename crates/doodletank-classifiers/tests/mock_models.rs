//! Mock model backends for testing
//!
//! Provides configurable implementations of the ModelBackend and
//! ModelSession traits for testing the loader, the classification
//! pipeline, and the fail-open path without an ONNX model on disk.

use async_trait::async_trait;
use doodletank_classifiers::{
    DoodleClassifier, InferenceRunner, LoaderState, ModelBackend, ModelHandle, ModelLoader,
    ModelSession, SketchClassifier, StrokeMonitor, SubjectConfig,
};
use doodletank_core::{Error, ImageSurface, InputTensor, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a mock session misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFault {
    /// The forward pass returns an error
    RunError,
    /// The first output is empty
    EmptyOutput,
    /// The logit is NaN
    NanLogit,
}

/// A session that returns a fixed logit and records what it was fed
pub struct MockSession {
    logit: f32,
    input_names: Vec<String>,
    seen_input_names: Mutex<Vec<String>>,
    last_tensor: Mutex<Option<InputTensor>>,
    delay: Option<Duration>,
    fault: Option<SessionFault>,
}

impl MockSession {
    pub fn new(logit: f32) -> Self {
        Self {
            logit,
            input_names: vec!["pixel_values".to_string()],
            seen_input_names: Mutex::new(Vec::new()),
            last_tensor: Mutex::new(None),
            delay: None,
            fault: None,
        }
    }

    /// Make every forward pass fail the given way
    pub fn with_fault(mut self, fault: SessionFault) -> Self {
        self.fault = Some(fault);
        self
    }

    /// Declare no inputs, as some runtimes report for stripped models
    pub fn without_input_names(mut self) -> Self {
        self.input_names.clear();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn seen_input_names(&self) -> Vec<String> {
        self.seen_input_names.lock().clone()
    }

    pub fn last_tensor(&self) -> Option<InputTensor> {
        self.last_tensor.lock().clone()
    }
}

#[async_trait]
impl ModelSession for MockSession {
    fn input_names(&self) -> Vec<String> {
        self.input_names.clone()
    }

    async fn run(&self, input_name: &str, tensor: InputTensor) -> Result<Vec<f32>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.seen_input_names.lock().push(input_name.to_string());
        *self.last_tensor.lock() = Some(tensor);

        match self.fault {
            Some(SessionFault::RunError) => Err(Error::inference("graph execution failed")),
            Some(SessionFault::EmptyOutput) => Ok(Vec::new()),
            Some(SessionFault::NanLogit) => Ok(vec![f32::NAN]),
            None => Ok(vec![self.logit]),
        }
    }
}

/// A backend that counts loads and can fail or panic on its first N attempts
pub struct MockBackend {
    session: Arc<MockSession>,
    load_delay: Duration,
    fail_first: u32,
    panic_first: u32,
    loads: AtomicU32,
}

impl MockBackend {
    pub fn new(session: MockSession) -> Self {
        Self {
            session: Arc::new(session),
            load_delay: Duration::from_millis(20),
            fail_first: 0,
            panic_first: 0,
            loads: AtomicU32::new(0),
        }
    }

    pub fn with_logit(logit: f32) -> Self {
        Self::new(MockSession::new(logit))
    }

    /// Fail the first `n` load attempts
    pub fn failing_first(mut self, n: u32) -> Self {
        self.fail_first = n;
        self
    }

    /// Panic during the first `n` load attempts
    pub fn panicking_first(mut self, n: u32) -> Self {
        self.panic_first = n;
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn session(&self) -> Arc<MockSession> {
        Arc::clone(&self.session)
    }

    /// Number of completed and in-flight load calls
    pub fn loads(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for MockBackend {
    async fn load(&self) -> Result<ModelHandle> {
        let attempt = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.load_delay).await;

        if attempt <= self.panic_first {
            panic!("attempt {attempt}: runtime crashed");
        }
        if attempt <= self.fail_first {
            return Err(Error::model_load(format!("attempt {attempt}: resource missing")));
        }
        Ok(self.session.clone() as ModelHandle)
    }

    fn describe(&self) -> String {
        "mock_doodle_classifier.onnx".to_string()
    }
}

fn classifier_with(backend: Arc<MockBackend>) -> DoodleClassifier {
    DoodleClassifier::new(&SubjectConfig::fish(), ModelLoader::new(backend)).unwrap()
}

fn white_surface() -> ImageSurface {
    ImageSurface::filled(100, 100, [255, 255, 255, 255]).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_loads_once() {
        let backend = Arc::new(MockBackend::with_logit(0.0));
        let loader = ModelLoader::new(backend.clone());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.acquire().await })
            })
            .collect();

        let mut models = Vec::new();
        for handle in handles {
            models.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(backend.loads(), 1);
        assert_eq!(loader.load_count(), 1);
        assert!(models.iter().all(|m| Arc::ptr_eq(m, &models[0])));
        assert_eq!(loader.state(), LoaderState::Loaded);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_waiters_share_failure() {
        let backend = Arc::new(MockBackend::with_logit(0.0).failing_first(1));
        let loader = ModelLoader::new(backend.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                tokio::spawn(async move { loader.acquire().await })
            })
            .collect();

        for handle in handles {
            let err = handle.await.unwrap().err().unwrap();
            assert_eq!(err.to_string(), "model load failed: attempt 1: resource missing");
        }
        assert_eq!(backend.loads(), 1);
        assert_eq!(loader.state(), LoaderState::Unloaded);
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let backend = Arc::new(MockBackend::with_logit(0.0).failing_first(1));
        let loader = ModelLoader::new(backend.clone());

        assert!(loader.acquire().await.is_err());
        assert!(!loader.is_loaded());

        assert!(loader.acquire().await.is_ok());
        assert_eq!(backend.loads(), 2);
        assert_eq!(loader.load_count(), 2);
        assert!(loader.is_loaded());
    }

    #[tokio::test]
    async fn test_loaded_model_is_cached() {
        let backend = Arc::new(MockBackend::with_logit(0.0));
        let loader = ModelLoader::new(backend.clone());

        let first = loader.acquire().await.unwrap();
        let second = loader.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.loads(), 1);
    }

    #[tokio::test]
    async fn test_dropped_waiter_does_not_cancel_load() {
        let backend =
            Arc::new(MockBackend::with_logit(0.0).with_load_delay(Duration::from_millis(30)));
        let loader = ModelLoader::new(backend.clone());

        let waiter = tokio::spawn({
            let loader = loader.clone();
            async move { loader.acquire().await }
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        waiter.abort();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(loader.is_loaded());

        loader.acquire().await.unwrap();
        assert_eq!(backend.loads(), 1);
    }

    #[tokio::test]
    async fn test_preload_then_classify_loads_once() {
        let backend = Arc::new(MockBackend::with_logit(-5.0));
        let classifier = classifier_with(backend.clone());

        let preload = classifier.preload();
        let result = classifier.classify(&white_surface()).await;
        preload.await.unwrap();

        assert!(result.is_target_class);
        assert_eq!(backend.loads(), 1);
    }

    #[tokio::test]
    async fn test_white_surface_with_positive_logit_is_flagged() {
        let backend = Arc::new(MockBackend::with_logit(5.0));
        let classifier = classifier_with(backend.clone());

        let result = classifier.try_classify(&white_surface()).await.unwrap();
        assert_eq!(result.probability_percent, 0.7);
        assert!(!result.is_target_class);
        assert!(result.needs_moderation());
        assert!(!result.fallback);
        assert_eq!(result.logit, Some(5.0));

        // The model saw a full-size tensor of normalized white.
        let tensor = backend.session().last_tensor().unwrap();
        assert_eq!(tensor.len(), 150_528);
        assert!((tensor.as_slice()[0] - 2.2489083).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_negative_logit_passes() {
        let classifier = classifier_with(Arc::new(MockBackend::with_logit(-5.0)));

        let result = classifier.classify(&white_surface()).await;
        assert_eq!(result.probability_percent, 99.3);
        assert!(result.is_target_class);
        assert_eq!(result.display_label("fish"), "Fish probability: 99.3%");
    }

    #[tokio::test]
    async fn test_load_failure_fails_open() {
        let backend = Arc::new(MockBackend::with_logit(5.0).failing_first(u32::MAX));
        let classifier = classifier_with(backend);

        assert!(classifier.try_classify(&white_surface()).await.is_err());

        let result = classifier.classify(&white_surface()).await;
        assert!(result.is_target_class);
        assert!(result.fallback);
        assert_eq!(result.probability_percent, 100.0);
        assert_eq!(result.display_label("fish"), "Fish probability: unavailable");
    }

    #[tokio::test]
    async fn test_declared_input_name_is_bound() {
        let backend = Arc::new(MockBackend::with_logit(0.0));
        let runner = InferenceRunner::new(ModelLoader::new(backend.clone()));

        runner.run(InputTensor::zeros()).await.unwrap();
        assert_eq!(backend.session().seen_input_names(), vec!["pixel_values"]);
    }

    #[tokio::test]
    async fn test_fallback_input_name() {
        let backend = Arc::new(MockBackend::new(MockSession::new(0.0).without_input_names()));
        let runner = InferenceRunner::new(ModelLoader::new(backend.clone()));

        let logit = runner.run(InputTensor::zeros()).await.unwrap();
        assert_eq!(logit, 0.0);
        assert_eq!(backend.session().seen_input_names(), vec!["input"]);
    }

    #[tokio::test]
    async fn test_run_if_loaded_requires_model() {
        let backend = Arc::new(MockBackend::with_logit(1.0));
        let runner = InferenceRunner::new(ModelLoader::new(backend.clone()));

        let err = runner.run_if_loaded(InputTensor::zeros()).await.unwrap_err();
        assert!(matches!(err, Error::InferenceUnavailable(_)));
        assert!(err.is_model_unavailable());
        assert_eq!(backend.loads(), 0);

        runner.loader().acquire().await.unwrap();
        assert_eq!(runner.run_if_loaded(InputTensor::zeros()).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_custom_threshold() {
        let mut config = SubjectConfig::bird();
        config.threshold = 0.5;
        let loader = ModelLoader::new(Arc::new(MockBackend::with_logit(0.0)));
        let classifier = DoodleClassifier::new(&config, loader).unwrap();

        let result = classifier.classify(&white_surface()).await;
        assert_eq!(classifier.subject(), "bird");
        assert_eq!(result.probability_percent, 50.0);
        assert!(result.is_target_class);
    }

    #[tokio::test]
    async fn test_monitor_keeps_latest_decision() {
        // Both checks share one loader; the model answers slowly so the two
        // forward passes overlap.
        let session = MockSession::new(5.0).with_delay(Duration::from_millis(10));
        let backend = Arc::new(MockBackend::new(session).with_load_delay(Duration::ZERO));
        let monitor = StrokeMonitor::new(classifier_with(backend).into_shared());

        assert!(monitor.last_check());
        let (surface_a, surface_b) = (white_surface(), white_surface());
        let (a, b) = tokio::join!(monitor.check(&surface_a), monitor.check(&surface_b));

        assert!(a.is_some() || b.is_some());
        assert!(!monitor.last_check());
        assert_eq!(monitor.last_result().unwrap().probability_percent, 0.7);
    }

    #[tokio::test]
    async fn test_panicking_load_resets_loader() {
        let backend = Arc::new(MockBackend::with_logit(-5.0).panicking_first(1));
        let loader = ModelLoader::new(backend.clone());

        let err = loader.acquire().await.err().unwrap();
        assert!(matches!(err, Error::ModelLoad(ref msg) if msg == "model backend panicked"));
        assert_eq!(loader.state(), LoaderState::Unloaded);

        // The next attempt loads normally.
        loader.acquire().await.unwrap();
        assert!(loader.is_loaded());
        assert_eq!(backend.loads(), 2);
    }

    #[tokio::test]
    async fn test_panicking_load_fails_open_then_recovers() {
        let backend = Arc::new(MockBackend::with_logit(-5.0).panicking_first(1));
        let classifier = classifier_with(backend.clone());

        let first = classifier.classify(&white_surface()).await;
        assert!(first.is_target_class);
        assert!(first.fallback);

        let second = classifier.classify(&white_surface()).await;
        assert!(!second.fallback);
        assert_eq!(second.probability_percent, 99.3);
    }

    async fn assert_fault_fails_open(fault: SessionFault) {
        // +5 would be flagged, so a pass can only come from the fallback.
        let backend = Arc::new(MockBackend::new(MockSession::new(5.0).with_fault(fault)));
        let classifier = classifier_with(backend);

        let err = classifier.try_classify(&white_surface()).await.unwrap_err();
        assert!(matches!(err, Error::Inference(_)), "{fault:?} gave {err}");
        assert!(!err.is_model_unavailable());

        let result = classifier.classify(&white_surface()).await;
        assert!(result.is_target_class);
        assert!(result.fallback);
        assert_eq!(result.logit, None);
        assert!(!result.needs_moderation());
    }

    #[tokio::test]
    async fn test_session_error_fails_open() {
        assert_fault_fails_open(SessionFault::RunError).await;
    }

    #[tokio::test]
    async fn test_empty_output_fails_open() {
        assert_fault_fails_open(SessionFault::EmptyOutput).await;
    }

    #[tokio::test]
    async fn test_nan_logit_fails_open() {
        assert_fault_fails_open(SessionFault::NanLogit).await;
    }

    #[tokio::test]
    async fn test_runner_reports_malformed_output() {
        let backend = Arc::new(MockBackend::new(
            MockSession::new(0.0).with_fault(SessionFault::EmptyOutput),
        ));
        let runner = InferenceRunner::new(ModelLoader::new(backend));

        let err = runner.run(InputTensor::zeros()).await.unwrap_err();
        assert_eq!(err.to_string(), "inference error: model produced an empty output");
    }
}
