//! Stroke-check bookkeeping
//!
//! A check runs after every stroke, so several may be in flight at once and
//! complete out of order. [`StrokeMonitor`] numbers each request and only
//! publishes a result if nothing newer has been published yet.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use doodletank_core::{ClassificationResult, ImageSurface};
use parking_lot::Mutex;
use tracing::debug;

use crate::classifier::SketchClassifier;

#[derive(Default)]
struct Published {
    generation: u64,
    result: Option<ClassificationResult>,
}

/// Latest-request-wins wrapper around a classifier.
pub struct StrokeMonitor {
    classifier: Arc<dyn SketchClassifier>,
    issued: AtomicU64,
    published: Mutex<Published>,
}

impl StrokeMonitor {
    pub fn new(classifier: Arc<dyn SketchClassifier>) -> Self {
        Self {
            classifier,
            issued: AtomicU64::new(0),
            published: Mutex::new(Published::default()),
        }
    }

    /// Classify the current drawing.
    ///
    /// Returns the result if it was published, or `None` when a newer check
    /// finished first and this one is stale.
    pub async fn check(&self, surface: &ImageSurface) -> Option<ClassificationResult> {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.classifier.classify(surface).await;

        let mut published = self.published.lock();
        if generation < published.generation {
            debug!(
                generation,
                latest = published.generation,
                "discarding stale stroke check"
            );
            return None;
        }

        published.generation = generation;
        published.result = Some(result.clone());
        Some(result)
    }

    /// Most recent published decision. True until the first check completes.
    pub fn last_check(&self) -> bool {
        self.published
            .lock()
            .result
            .as_ref()
            .map_or(true, |r| r.is_target_class)
    }

    /// Most recent published result
    pub fn last_result(&self) -> Option<ClassificationResult> {
        self.published.lock().result.clone()
    }

    pub fn classifier(&self) -> &Arc<dyn SketchClassifier> {
        &self.classifier
    }
}
