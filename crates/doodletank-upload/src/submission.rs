//! Gallery submission payload

use doodletank_core::{ClassificationResult, ImageSurface, Result};

/// Artist name used when none is given
pub const ANONYMOUS_ARTIST: &str = "Anonymous";

/// Trim an artist signature, falling back to [`ANONYMOUS_ARTIST`].
pub fn normalize_artist(artist: &str) -> String {
    let trimmed = artist.trim();
    if trimmed.is_empty() {
        ANONYMOUS_ARTIST.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A finished drawing ready for upload
#[derive(Debug, Clone)]
pub struct Submission {
    /// PNG-encoded drawing
    pub image_png: Vec<u8>,

    /// Normalized artist signature
    pub artist: String,

    /// Whether the drawing goes to moderator review before appearing
    pub needs_moderation: bool,

    /// Returning user id, if the backend assigned one earlier
    pub user_id: Option<String>,
}

impl Submission {
    /// Build a submission from the drawing and its last classification.
    ///
    /// Drawings that did not look like the subject are flagged for review.
    /// Fail-open results pass straight through.
    pub fn new(
        surface: &ImageSurface,
        artist: &str,
        classification: &ClassificationResult,
    ) -> Result<Self> {
        Ok(Self {
            image_png: surface.encode_png()?,
            artist: normalize_artist(artist),
            needs_moderation: classification.needs_moderation(),
            user_id: None,
        })
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}
