//! Per-clip segment generation under a bounded worker pool.
//!
//! Each [`ClipSpec`](beatcut_media_model::ClipSpec) becomes one external-tool
//! invocation that animates a still image (Ken Burns) over the clip's
//! beat-exact duration. Segment files are named by clip index, so playback
//! order is recovered deterministically no matter what order generation
//! completes in. A single clip failure never aborts sibling work; the caller
//! decides from the batch report whether the job can proceed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use beatcut_media_model::{ClipSpec, MotionStyle, OutputGeometry};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::runner::ProcessRunner;

/// Maximum zoom factor reached by the zoom motions.
const MAX_ZOOM: f64 = 1.3;
/// Fixed zoom level while panning.
const PAN_ZOOM: f64 = 1.15;

/// A materialized clip segment on disk. Never mutated after creation, only
/// consumed by the composer.
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub path: PathBuf,
    pub duration_secs: f64,
}

/// One isolated clip failure. Tool exit status and a missing/empty output
/// artifact are the same failure class.
#[derive(Debug, Clone)]
pub struct ClipFailure {
    pub index: usize,
    pub message: String,
}

/// Outcome of generating a whole clip list.
#[derive(Debug, Default)]
pub struct ClipBatch {
    /// Surviving segments, ordered by clip index.
    pub segments: Vec<Segment>,
    /// Failures, ordered by clip index.
    pub failures: Vec<ClipFailure>,
}

/// Deterministic segment file name for a clip index. Pure: regenerating the
/// same spec list in any execution order yields the same file-to-index map.
pub fn segment_file_name(index: usize) -> String {
    format!("clip_{index:03}.mp4")
}

/// Generates clip segments with bounded parallelism.
pub struct ClipGenerator {
    runner: Arc<dyn ProcessRunner>,
    geometry: OutputGeometry,
    encoder_args: Vec<String>,
    workers: usize,
}

impl ClipGenerator {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        geometry: OutputGeometry,
        encoder_args: Vec<String>,
        workers: usize,
    ) -> Self {
        Self {
            runner,
            geometry,
            encoder_args,
            workers: workers.max(1),
        }
    }

    /// Generate every clip in `specs`, writing segments into `dir`.
    ///
    /// Work is scheduled under a semaphore-bounded pool; completion order is
    /// irrelevant because results are keyed and re-sorted by clip index.
    pub async fn generate_all(&self, specs: &[ClipSpec], dir: &Path) -> ClipBatch {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks: JoinSet<Result<Segment, ClipFailure>> = JoinSet::new();

        for spec in specs.iter().cloned() {
            let runner = Arc::clone(&self.runner);
            let semaphore = Arc::clone(&semaphore);
            let geometry = self.geometry;
            let encoder_args = self.encoder_args.clone();
            let output = dir.join(segment_file_name(spec.index));

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("clip semaphore never closed");
                generate_one(runner.as_ref(), &spec, geometry, &encoder_args, &output).await
            });
        }

        let mut batch = ClipBatch::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(segment)) => batch.segments.push(segment),
                Ok(Err(failure)) => {
                    tracing::warn!(
                        index = failure.index,
                        error = %failure.message,
                        "Clip generation failed, continuing with siblings"
                    );
                    batch.failures.push(failure);
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "Clip generation task panicked");
                }
            }
        }

        batch.segments.sort_by_key(|s| s.index);
        batch.failures.sort_by_key(|f| f.index);

        tracing::info!(
            requested = specs.len(),
            generated = batch.segments.len(),
            failed = batch.failures.len(),
            "Clip batch complete"
        );

        batch
    }
}

async fn generate_one(
    runner: &dyn ProcessRunner,
    spec: &ClipSpec,
    geometry: OutputGeometry,
    encoder_args: &[String],
    output: &Path,
) -> Result<Segment, ClipFailure> {
    let args = build_clip_args(spec, geometry, encoder_args, output);

    let outcome = runner.run("ffmpeg", &args).await;
    let failure_message = match outcome {
        Ok(out) if out.success() => match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => {
                return Ok(Segment {
                    index: spec.index,
                    path: output.to_path_buf(),
                    duration_secs: spec.duration_secs,
                });
            }
            _ => "tool exited 0 but produced no usable artifact".to_string(),
        },
        Ok(out) => format!("tool exited {}: {}", out.status, out.stderr.trim()),
        Err(e) => e.to_string(),
    };

    Err(ClipFailure {
        index: spec.index,
        message: failure_message,
    })
}

/// Full argument list for one clip invocation.
fn build_clip_args(
    spec: &ClipSpec,
    geometry: OutputGeometry,
    encoder_args: &[String],
    output: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-loop".to_string(),
        "1".to_string(),
        "-i".to_string(),
        spec.image.display().to_string(),
        "-t".to_string(),
        format!("{:.6}", spec.duration_secs),
        "-vf".to_string(),
        motion_filter(spec.motion, spec.duration_secs, geometry),
        "-r".to_string(),
        geometry.fps.to_string(),
        "-an".to_string(),
    ];
    args.extend(encoder_args.iter().cloned());
    args.push(output.display().to_string());
    args
}

/// Ken Burns filter expression for one motion style.
///
/// The image is first scaled/cropped to cover the output geometry, then
/// animated with `zoompan` over the clip's frame count.
fn motion_filter(motion: MotionStyle, duration_secs: f64, geometry: OutputGeometry) -> String {
    let (w, h, fps) = (geometry.width, geometry.height, geometry.fps);
    let frames = ((duration_secs * fps as f64).round() as u64).max(1);
    let cover = format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h}");

    match motion {
        MotionStyle::ZoomIn => format!(
            "{cover},zoompan=z='min(1+{span:.4}*on/{frames},{max:.4})':d={frames}:\
             x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={w}x{h}:fps={fps}",
            span = MAX_ZOOM - 1.0,
            max = MAX_ZOOM,
        ),
        MotionStyle::ZoomOut => format!(
            "{cover},zoompan=z='max({max:.4}-{span:.4}*on/{frames},1.0)':d={frames}:\
             x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={w}x{h}:fps={fps}",
            span = MAX_ZOOM - 1.0,
            max = MAX_ZOOM,
        ),
        MotionStyle::Pan => format!(
            "{cover},zoompan=z='{zoom:.4}':d={frames}:\
             x='(iw-iw/zoom)*on/{frames}':y='ih/2-(ih/zoom/2)':s={w}x{h}:fps={fps}",
            zoom = PAN_ZOOM,
        ),
        MotionStyle::Static => format!("{cover},format=yuv420p"),
    }
}
