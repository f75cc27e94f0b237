use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "doodletank")]
#[command(author, version, about = "Classify and submit doodles for the tank")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Subject to look for (fish, bird, ...)
    #[arg(short, long, global = true)]
    pub subject: Option<String>,

    /// Subject configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Model path or URL, overriding the configuration
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    /// Decision threshold in (0, 1), overriding the configuration
    #[arg(short, long, global = true)]
    pub threshold: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify one or more drawings
    Classify {
        /// PNG or JPEG files
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,

        /// Report model errors instead of assuming a pass
        #[arg(long)]
        strict: bool,
    },

    /// Replay stroke snapshots through the stroke monitor
    Replay {
        /// Snapshots in stroke order
        #[arg(required = true)]
        frames: Vec<PathBuf>,
    },

    /// Crop a drawing to its content and write a gallery thumbnail
    Thumbnail {
        /// Source drawing
        image: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// Thumbnail width
        #[arg(long, default_value = "80", value_parser = clap::value_parser!(u32).range(1..))]
        width: u32,

        /// Thumbnail height
        #[arg(long, default_value = "48", value_parser = clap::value_parser!(u32).range(1..))]
        height: u32,
    },

    /// Classify a drawing and upload it to the gallery
    Submit {
        /// Drawing to submit
        image: PathBuf,

        /// Artist signature
        #[arg(short, long, default_value = "")]
        artist: String,

        /// Returning user id
        #[arg(long)]
        user_id: Option<String>,

        /// Gallery backend URL, overriding the configuration
        #[arg(short, long, env = "DOODLETANK_BACKEND_URL")]
        backend: Option<String>,

        /// Bearer token for signed-in artists
        #[arg(long, env = "DOODLETANK_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}
