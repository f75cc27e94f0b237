//! HTTP client for the gallery backend

use std::time::Duration;

use doodletank_core::{Error, Result};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::submission::Submission;

/// What the backend returned for an accepted upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// URL of the stored image
    pub image_url: String,

    /// User id to send with later submissions
    pub user_id: Option<String>,

    /// Whether the drawing is waiting for moderator review
    pub needs_moderation: bool,
}

/// Uploads drawings to `{backend_url}/upload{subject}`.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    backend_url: String,
    subject: String,
    token: Option<String>,
}

impl UploadClient {
    pub fn new(backend_url: impl Into<String>, subject: impl Into<String>) -> Result<Self> {
        let backend_url = backend_url.into();
        if backend_url.trim().is_empty() {
            return Err(Error::config("backend URL not configured"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::upload(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            backend_url: backend_url.trim_end_matches('/').to_string(),
            subject: subject.into(),
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every upload
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Upload endpoint, e.g. `https://api.example.com/uploadfish`
    pub fn endpoint(&self) -> String {
        format!("{}/upload{}", self.backend_url, self.subject)
    }

    /// Submit a drawing.
    ///
    /// The upload counts as accepted only when the response carries
    /// `data.Image`; anything else is an [`Error::Upload`].
    pub async fn submit(&self, submission: &Submission) -> Result<UploadReceipt> {
        let image = Part::bytes(submission.image_png.clone())
            .file_name(format!("{}.png", self.subject))
            .mime_str("image/png")
            .map_err(|e| Error::upload(e.to_string()))?;

        let mut form = Form::new()
            .part("image", image)
            .text("artist", submission.artist.clone())
            .text("needsModeration", submission.needs_moderation.to_string());
        if let Some(user_id) = &submission.user_id {
            form = form.text("userId", user_id.clone());
        }

        let endpoint = self.endpoint();
        let mut request = self.http.post(endpoint.as_str()).multipart(form);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!(%endpoint, artist = %submission.artist, needs_moderation = submission.needs_moderation, "uploading drawing");
        let response = request
            .send()
            .await
            .map_err(|e| Error::upload(format!("request to {endpoint} failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::upload(format!("invalid response ({status}): {e}")))?;

        let receipt = parse_receipt(&body, submission.needs_moderation).ok_or_else(|| {
            warn!(%status, "backend rejected upload");
            Error::upload(format!("backend did not accept the upload ({status})"))
        })?;

        info!(
            image = %receipt.image_url,
            needs_moderation = receipt.needs_moderation,
            "drawing uploaded"
        );
        Ok(receipt)
    }
}

fn parse_receipt(body: &Value, needs_moderation: bool) -> Option<UploadReceipt> {
    let data = body.get("data")?;
    let image_url = data.get("Image")?.as_str().filter(|s| !s.is_empty())?;

    // Some backends return numeric ids.
    let user_id = match data.get("userId") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };

    Some(UploadReceipt {
        image_url: image_url.to_string(),
        user_id,
        needs_moderation,
    })
}
