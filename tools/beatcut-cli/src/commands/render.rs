//! Render one video locally from a directory of images and an audio track.
//!
//! Uses the filesystem asset store and the full pipeline, so a local run
//! exercises exactly the stage sequence a hosted job does. Beat data is
//! read from a `<audio>.beats.json` sidecar when present; without one the
//! planner falls back to uniform clip durations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beatcut_common::{AppConfig, BeatcutError, BeatcutResult};
use beatcut_media_model::AudioAnalysis;
use beatcut_pipeline::{
    AudioAnalyzer, JobRequest, LocalAssetStore, LogProgressSink, PipelineOrchestrator,
};
use beatcut_render_engine::{EncoderCaps, SystemRunner};
use serde::Deserialize;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "bmp"];

/// Reads detected beats from a JSON sidecar next to the audio file.
struct BeatsFileAnalyzer;

#[derive(Deserialize)]
struct BeatsFile {
    bpm: f64,
    beat_times: Vec<f64>,
}

#[async_trait]
impl AudioAnalyzer for BeatsFileAnalyzer {
    async fn analyze(&self, path: &Path) -> BeatcutResult<AudioAnalysis> {
        let sidecar = PathBuf::from(format!("{}.beats.json", path.display()));
        let content = tokio::fs::read_to_string(&sidecar).await.map_err(|_| {
            BeatcutError::analysis(format!("no beats sidecar at {}", sidecar.display()))
        })?;
        let beats: BeatsFile = serde_json::from_str(&content)?;
        let duration_secs = beats.beat_times.last().copied().unwrap_or_default();
        Ok(AudioAnalysis {
            bpm: beats.bpm,
            beat_times: beats.beat_times,
            duration_secs,
        })
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn run(
    images: PathBuf,
    audio: PathBuf,
    output: PathBuf,
    duration: f64,
    transitions: Vec<String>,
    motions: Vec<String>,
    caption: Option<String>,
    width: u32,
    height: u32,
    fps: u32,
) -> anyhow::Result<()> {
    let image_urls = collect_images(&images)?;
    println!("Found {} images in {}", image_urls.len(), images.display());

    let mut config = AppConfig::load();
    config.render.width = width;
    config.render.height = height;
    config.render.fps = fps;

    let runner = Arc::new(SystemRunner::new(Duration::from_secs(
        config.pipeline.tool_timeout_secs,
    )));
    let caps = EncoderCaps::detect(runner.as_ref()).await;

    let output_dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let output_key = output
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("output path has no file name"))?
        .to_string_lossy()
        .into_owned();

    let job_id = format!(
        "render-{}",
        output.file_stem().unwrap_or_default().to_string_lossy()
    );

    let orchestrator = PipelineOrchestrator::new(
        config,
        Arc::new(LocalAssetStore::new(output_dir)),
        Arc::new(BeatsFileAnalyzer),
        runner,
        caps,
        Arc::new(LogProgressSink),
    )?;

    let request = JobRequest {
        job_id,
        image_urls,
        audio_url: audio.display().to_string(),
        target_secs: duration,
        transition_candidates: transitions,
        motion_candidates: motions,
        caption,
        output_key,
    };

    let outcome = orchestrator.run_job(request).await?;
    println!("Rendered: {}", outcome.artifact);
    Ok(())
}

/// Collect image files from a directory in name order.
fn collect_images(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        anyhow::bail!("no images found in {}", dir.display());
    }
    Ok(paths.iter().map(|p| p.display().to_string()).collect())
}
