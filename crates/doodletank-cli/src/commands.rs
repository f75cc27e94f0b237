use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use doodletank_classifiers::{
    DoodleClassifier, ModelLocation, SketchClassifier, StrokeMonitor, SubjectConfig,
};
use doodletank_core::{ClassificationResult, ImageSurface};
use doodletank_upload::{Submission, UploadClient};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::cli::GlobalArgs;

/// Resolve the subject configuration: file or preset, then CLI overrides.
pub fn resolve_config(args: &GlobalArgs) -> Result<SubjectConfig> {
    let mut config = match &args.config {
        Some(path) => SubjectConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => {
            let subject = args.subject.as_deref().unwrap_or("fish");
            SubjectConfig::preset(subject).unwrap_or_else(|| SubjectConfig::for_subject(subject))
        }
    };

    if let (Some(_), Some(subject)) = (&args.config, &args.subject) {
        config.subject = subject.clone();
    }
    if let Some(model) = &args.model {
        config.model = ModelLocation::parse(model);
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }

    config.validate()?;
    debug!(?config, "resolved subject configuration");
    Ok(config)
}

fn load_classifier(config: &SubjectConfig) -> Result<DoodleClassifier> {
    let classifier = DoodleClassifier::from_config(config)?;
    // Warm the model while images are decoded.
    classifier.preload();
    Ok(classifier)
}

fn open_surface(path: &Path) -> Result<ImageSurface> {
    ImageSurface::open(path).with_context(|| format!("reading {}", path.display()))
}

fn print_result(path: &Path, subject: &str, result: &ClassificationResult, json: bool) -> Result<()> {
    if json {
        let line = serde_json::json!({
            "file": path.display().to_string(),
            "subject": subject,
            "result": result,
        });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        let verdict = if result.is_target_class { "pass" } else { "review" };
        println!(
            "{}: {} [{}]",
            path.display(),
            result.display_label(subject),
            verdict
        );
    }
    Ok(())
}

pub async fn classify(
    config: &SubjectConfig,
    images: &[PathBuf],
    json: bool,
    strict: bool,
) -> Result<()> {
    let classifier = load_classifier(config)?;

    for path in images {
        let surface = open_surface(path)?;
        let result = if strict {
            classifier.try_classify(&surface).await?
        } else {
            classifier.classify(&surface).await
        };
        print_result(path, &config.subject, &result, json)?;
    }

    Ok(())
}

/// Fire one stroke check per frame without waiting, as a drawing surface
/// does, and report which results were kept.
pub async fn replay(config: &SubjectConfig, frames: &[PathBuf]) -> Result<()> {
    let monitor = Arc::new(StrokeMonitor::new(load_classifier(config)?.into_shared()));

    let mut checks = JoinSet::new();
    for (stroke, path) in frames.iter().enumerate() {
        let surface = open_surface(path)?;
        let monitor = Arc::clone(&monitor);
        let path = path.clone();
        checks.spawn(async move { (stroke, path, monitor.check(&surface).await) });
        tokio::task::yield_now().await;
    }

    while let Some(joined) = checks.join_next().await {
        let (stroke, path, published) = joined?;
        match published {
            Some(result) => println!(
                "stroke {stroke} ({}): {}",
                path.display(),
                result.display_label(&config.subject)
            ),
            None => println!("stroke {stroke} ({}): superseded", path.display()),
        }
    }

    let last = monitor
        .last_result()
        .ok_or_else(|| anyhow!("no stroke check completed"))?;
    println!(
        "last check: {} ({})",
        if monitor.last_check() { "pass" } else { "review" },
        last.display_label(&config.subject)
    );
    Ok(())
}

pub fn thumbnail(image: &Path, output: &Path, width: u32, height: u32) -> Result<()> {
    let surface = open_surface(image)?;
    let bounds = surface.content_bounds();
    let thumb = surface.thumbnail(width, height)?;

    std::fs::write(output, thumb.encode_png()?)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(?bounds, output = %output.display(), "thumbnail written");
    println!("{} -> {} ({width}x{height})", image.display(), output.display());
    Ok(())
}

pub async fn submit(
    config: &SubjectConfig,
    image: &Path,
    artist: &str,
    user_id: Option<String>,
    backend: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let backend = backend
        .or_else(|| config.backend_url.clone())
        .ok_or_else(|| anyhow!("no backend URL: pass --backend or set backend_url"))?;

    let surface = open_surface(image)?;
    let classifier = load_classifier(config)?;
    let result = classifier.classify(&surface).await;
    print_result(image, &config.subject, &result, false)?;

    let mut submission = Submission::new(&surface, artist, &result)?;
    if let Some(user_id) = user_id {
        submission = submission.with_user_id(user_id);
    }

    let mut client = UploadClient::new(backend, config.subject.clone())?;
    if let Some(token) = token {
        client = client.with_token(token);
    }

    let receipt = client.submit(&submission).await?;
    if receipt.needs_moderation {
        println!(
            "Submitted for review: your {} will appear once a moderator approves it.",
            config.subject
        );
    } else {
        println!("Submitted: {}", receipt.image_url);
    }
    if let Some(user_id) = receipt.user_id {
        println!("User id: {user_id}");
    }
    Ok(())
}
