//! Print the computed clip plan as JSON, without rendering anything.
//!
//! Debugging aid for tuning clip bounds and transition lists against a
//! known tempo or a detected beat file.

use std::path::PathBuf;

use beatcut_common::AppConfig;
use beatcut_media_model::{AudioAnalysis, BeatGrid};
use beatcut_plan_core::{TimingConfig, TimingPlanner, TransitionCatalog, TransitionPlanner};
use serde::Deserialize;

#[derive(Deserialize)]
struct BeatsFile {
    bpm: f64,
    beat_times: Vec<f64>,
}

pub fn run(
    bpm: Option<f64>,
    beats_file: Option<PathBuf>,
    duration: f64,
    image_count: usize,
    transitions: Vec<String>,
) -> anyhow::Result<()> {
    let config = AppConfig::load();

    let analysis = match (beats_file, bpm) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(&path)?;
            let beats: BeatsFile = serde_json::from_str(&content)?;
            let duration_secs = beats.beat_times.last().copied().unwrap_or(duration);
            AudioAnalysis {
                bpm: beats.bpm,
                beat_times: beats.beat_times,
                duration_secs,
            }
        }
        (None, Some(bpm)) => synthetic_analysis(bpm, duration),
        (None, None) => AudioAnalysis::unavailable(duration),
    };

    let grid = BeatGrid::from_analysis(&analysis);
    let images: Vec<PathBuf> = (0..image_count.max(1))
        .map(|i| PathBuf::from(format!("image_{i:02}.jpg")))
        .collect();

    let timing = TimingPlanner::new(TimingConfig {
        min_clip_secs: config.render.min_clip_secs,
        max_clip_secs: config.render.max_clip_secs,
        fallback_clip_secs: config.render.fallback_clip_secs,
    });
    let clips = timing.plan(grid.as_ref(), duration, &images, &[]);

    let planner = TransitionPlanner::new(TransitionCatalog::load_embedded()?);
    let specs = planner.plan(&clips, &transitions, config.render.transition_secs);

    let report = serde_json::json!({
        "beat_synced": grid.is_some(),
        "clip_count": clips.len(),
        "clips": clips,
        "transitions": specs,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Uniform beat grid covering twice the target, so the clip count is never
/// capped by a too-short synthetic grid.
fn synthetic_analysis(bpm: f64, duration: f64) -> AudioAnalysis {
    let interval = 60.0 / bpm.max(1.0);
    let count = ((duration * 2.0) / interval).ceil() as usize + 1;
    AudioAnalysis {
        bpm,
        beat_times: (0..count).map(|i| i as f64 * interval).collect(),
        duration_secs: duration * 2.0,
    }
}
