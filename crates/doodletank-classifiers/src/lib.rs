//! Doodletank Classifiers
//!
//! Decides whether a freehand sketch depicts the configured subject (a fish,
//! a bird) using a binary image classifier.
//!
//! The pipeline for one stroke check:
//! - [`preprocess`]: RGBA surface to a `[1, 3, 224, 224]` normalized tensor
//! - [`ModelLoader`]: single-flight, lazily loaded model shared by all callers
//! - [`InferenceRunner`]: one forward pass, one raw logit
//! - [`ClassificationPolicy`]: sigmoid, label inversion, threshold
//!
//! [`SketchClassifier::classify`] never fails. When the model cannot be
//! loaded or run it returns a permissive result so drawing and submitting
//! keep working.

pub mod classifier;
pub mod config;
pub mod inference;
pub mod model_loader;
pub mod monitor;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod policy;
pub mod preprocess;

pub use classifier::{DoodleClassifier, SketchClassifier};
pub use config::{ModelLocation, SubjectConfig, DEFAULT_INPUT_NAME};
pub use inference::InferenceRunner;
pub use model_loader::{LoaderState, ModelBackend, ModelHandle, ModelLoader, ModelSession};
pub use monitor::StrokeMonitor;
#[cfg(feature = "onnx")]
pub use onnx::OnnxBackend;
pub use policy::{sigmoid, ClassificationPolicy, DEFAULT_THRESHOLD};
pub use preprocess::{preprocess, IMAGENET_MEAN, IMAGENET_STD};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{DoodleClassifier, SketchClassifier};
    pub use crate::config::SubjectConfig;
    pub use crate::model_loader::{ModelBackend, ModelLoader, ModelSession};
    pub use crate::monitor::StrokeMonitor;
    pub use crate::policy::ClassificationPolicy;
    pub use doodletank_core::{ClassificationResult, ImageSurface};
}
