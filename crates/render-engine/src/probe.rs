//! ffprobe helpers for media inspection.

use std::path::Path;

use beatcut_common::{BeatcutError, BeatcutResult};

use crate::runner::ProcessRunner;

/// Measure the duration of a media file in seconds.
pub async fn probe_duration(runner: &dyn ProcessRunner, path: &Path) -> BeatcutResult<f64> {
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.display().to_string(),
    ];

    let output = runner.run("ffprobe", &args).await?;
    if !output.success() {
        return Err(BeatcutError::render(format!(
            "ffprobe failed for {} (status {}): {}",
            path.display(),
            output.status,
            output.stderr.trim()
        )));
    }

    output
        .stdout
        .trim()
        .parse::<f64>()
        .map_err(|e| BeatcutError::render(format!("Unparseable ffprobe duration: {e}")))
}

/// Read the pixel dimensions of the first video stream, if probeable.
pub async fn probe_dimensions(runner: &dyn ProcessRunner, path: &Path) -> Option<(u32, u32)> {
    let args = vec![
        "-v".to_string(),
        "error".to_string(),
        "-select_streams".to_string(),
        "v:0".to_string(),
        "-show_entries".to_string(),
        "stream=width,height".to_string(),
        "-of".to_string(),
        "csv=p=0:s=x".to_string(),
        path.display().to_string(),
    ];

    let output = runner.run("ffprobe", &args).await.ok()?;
    if !output.success() {
        return None;
    }

    let line = output.stdout.lines().next()?.trim();
    let (w, h) = line.split_once('x')?;
    let width = w.parse::<u32>().ok()?;
    let height = h.parse::<u32>().ok()?;
    Some((width, height))
}
