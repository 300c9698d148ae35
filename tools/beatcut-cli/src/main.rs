//! Beatcut CLI — Command-line interface for beat-synchronized rendering.
//!
//! Usage:
//!   beatcut render [OPTIONS]   Render a video from images and an audio track
//!   beatcut plan [OPTIONS]     Print the computed clip plan as JSON
//!   beatcut check              Check external tools and encoder capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "beatcut",
    about = "Beat-synchronized slideshow video rendering",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a video from a directory of images and an audio track
    Render {
        /// Directory containing source images
        #[arg(short, long)]
        images: PathBuf,

        /// Audio track to cut against
        #[arg(short, long)]
        audio: PathBuf,

        /// Output video file
        #[arg(short, long, default_value = "beatcut.mp4")]
        output: PathBuf,

        /// Target output duration (seconds)
        #[arg(short, long, default_value = "15.0")]
        duration: f64,

        /// Comma-separated transition identifiers, cycled across cuts
        #[arg(short, long)]
        transitions: Option<String>,

        /// Comma-separated motion identifiers, cycled across clips
        #[arg(short, long)]
        motions: Option<String>,

        /// Title rendered over the video
        #[arg(long)]
        caption: Option<String>,

        /// Output width
        #[arg(long, default_value = "1080")]
        width: u32,

        /// Output height
        #[arg(long, default_value = "1920")]
        height: u32,

        /// Output frame rate
        #[arg(long, default_value = "30")]
        fps: u32,
    },

    /// Print the computed clip plan as JSON without rendering
    Plan {
        /// Assumed tempo in BPM (uniform synthetic beat grid)
        #[arg(long)]
        bpm: Option<f64>,

        /// JSON file with detected beats: { "bpm": f64, "beat_times": [f64] }
        #[arg(long)]
        beats_file: Option<PathBuf>,

        /// Target output duration (seconds)
        #[arg(short, long, default_value = "15.0")]
        duration: f64,

        /// Number of source images to assume
        #[arg(short, long, default_value = "10")]
        images: usize,

        /// Comma-separated transition identifiers
        #[arg(short, long)]
        transitions: Option<String>,
    },

    /// Check external tools and encoder capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    beatcut_common::logging::init_logging(&beatcut_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        file: None,
    });

    match cli.command {
        Commands::Render {
            images,
            audio,
            output,
            duration,
            transitions,
            motions,
            caption,
            width,
            height,
            fps,
        } => {
            commands::render::run(
                images,
                audio,
                output,
                duration,
                split_list(transitions),
                split_list(motions),
                caption,
                width,
                height,
                fps,
            )
            .await
        }
        Commands::Plan {
            bpm,
            beats_file,
            duration,
            images,
            transitions,
        } => commands::plan::run(bpm, beats_file, duration, images, split_list(transitions)),
        Commands::Check => commands::check::run().await,
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
