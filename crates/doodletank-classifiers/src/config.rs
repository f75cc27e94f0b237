//! Per-subject configuration
//!
//! The fish and bird deployments run the same pipeline; only the subject
//! name, the model resource, and the decision threshold differ.

use std::fmt;
use std::path::{Path, PathBuf};

use doodletank_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::policy::DEFAULT_THRESHOLD;

/// Input name used when the model exposes no input metadata
pub const DEFAULT_INPUT_NAME: &str = "input";

/// Where the classifier model lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelLocation {
    /// Local file path
    Local { path: PathBuf },

    /// HTTP(S) URL, downloaded once and cached
    Url { url: String },
}

impl ModelLocation {
    /// Parse a CLI-style location: `http://` and `https://` are URLs,
    /// anything else is a path.
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url {
                url: value.to_string(),
            }
        } else {
            Self::Local {
                path: PathBuf::from(value),
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Local { path } => path.as_os_str().is_empty(),
            Self::Url { url } => url.is_empty(),
        }
    }
}

impl fmt::Display for ModelLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { path } => write!(f, "{}", path.display()),
            Self::Url { url } => f.write_str(url),
        }
    }
}

/// Configuration for one deployment subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfig {
    /// Subject being drawn, e.g. `fish`
    pub subject: String,

    /// Model resource
    pub model: ModelLocation,

    /// Target probability at or above which a sketch passes
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Input name to bind when the model exposes none
    #[serde(default = "default_input_name")]
    pub fallback_input_name: String,

    /// Gallery backend base URL
    #[serde(default)]
    pub backend_url: Option<String>,
}

impl SubjectConfig {
    /// Preset for a subject with the conventional model file name
    /// `<subject>_doodle_classifier.onnx`.
    pub fn for_subject(subject: impl Into<String>) -> Self {
        let subject = subject.into();
        Self {
            model: ModelLocation::Local {
                path: PathBuf::from(format!("{subject}_doodle_classifier.onnx")),
            },
            subject,
            threshold: default_threshold(),
            fallback_input_name: default_input_name(),
            backend_url: None,
        }
    }

    /// The fish tank deployment
    pub fn fish() -> Self {
        Self::for_subject("fish")
    }

    /// The bird deployment
    pub fn bird() -> Self {
        Self::for_subject("bird")
    }

    /// Built-in preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "fish" => Some(Self::fish()),
            "bird" => Some(Self::bird()),
            _ => None,
        }
    }

    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid subject config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Check invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(Error::config("subject must not be empty"));
        }
        if self.model.is_empty() {
            return Err(Error::config("model location must not be empty"));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(Error::config(format!(
                "threshold must be in (0, 1), got {}",
                self.threshold
            )));
        }
        if self.fallback_input_name.is_empty() {
            return Err(Error::config("fallback_input_name must not be empty"));
        }
        Ok(())
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_input_name() -> String {
    DEFAULT_INPUT_NAME.to_string()
}
