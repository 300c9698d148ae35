//! The pipeline orchestrator: runs one job through the fixed stage
//! sequence, applying each stage's failure policy.
//!
//! Stage sequence and policies:
//!
//! | Stage          | On failure                                        |
//! |----------------|---------------------------------------------------|
//! | Acquire        | duplicate assets round-robin, fatal below minimum |
//! | Analyze        | substitute neutral default, never fatal           |
//! | Plan           | infallible                                        |
//! | GenerateClips  | isolate per clip, fatal below 2 usable clips      |
//! | Compose        | backend chain, fatal only if all backends fail    |
//! | Overlay        | skip enhancement                                  |
//! | MixAudio       | skip enhancement                                  |
//! | VerifyDuration | ship untrimmed                                    |
//! | Finalize       | fatal                                             |
//!
//! A failed job surfaces a single human-readable reason. A degraded job
//! reports plain success; substitutions are visible only in logs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use beatcut_common::{AppConfig, BeatcutError, BeatcutResult};
use beatcut_media_model::{
    AudioAnalysis, BeatGrid, ClipSpec, EncoderPreference, OutputGeometry, RenderPlan,
};
use beatcut_plan_core::{TimingConfig, TimingPlanner, TransitionCatalog, TransitionPlanner};
use beatcut_render_engine::{
    probe, ClipBatch, ClipGenerator, EncoderCaps, ProcessRunner, Segment, SequenceComposer,
};
use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};

use crate::analysis::{analyze_with_deadline, AnalysisCache, AudioAnalyzer};
use crate::assets::AssetStore;
use crate::progress::{ProgressSink, StageWindow};

const WIN_ACQUIRE: StageWindow = StageWindow { start: 0, end: 15 };
const WIN_ANALYZE: StageWindow = StageWindow { start: 15, end: 25 };
const WIN_PLAN: StageWindow = StageWindow { start: 25, end: 30 };
const WIN_CLIPS: StageWindow = StageWindow { start: 30, end: 60 };
const WIN_COMPOSE: StageWindow = StageWindow { start: 60, end: 75 };
const WIN_OVERLAY: StageWindow = StageWindow { start: 75, end: 80 };
const WIN_AUDIO: StageWindow = StageWindow { start: 80, end: 88 };
const WIN_VERIFY: StageWindow = StageWindow { start: 88, end: 94 };
const WIN_FINALIZE: StageWindow = StageWindow { start: 94, end: 100 };

/// Everything needed to render one video.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job_id: String,
    pub image_urls: Vec<String>,
    pub audio_url: String,
    /// Requested output duration (seconds).
    pub target_secs: f64,
    /// Ranked transition identifiers from the effect-selection collaborator.
    pub transition_candidates: Vec<String>,
    /// Ranked motion identifiers from the effect-selection collaborator.
    pub motion_candidates: Vec<String>,
    /// Optional title rendered over the video.
    pub caption: Option<String>,
    /// Publication key for the finished artifact.
    pub output_key: String,
}

/// Result of a successful job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job_id: String,
    /// Locator of the published artifact.
    pub artifact: String,
}

/// Exclusively-owned working directory for one job. Removal is best-effort
/// on every exit path; a leaked directory is a log line, not an error.
struct JobContext {
    job_id: String,
    work_dir: PathBuf,
}

impl JobContext {
    async fn create(work_root: &Path, job_id: &str) -> BeatcutResult<Self> {
        let work_dir = work_root.join(job_id);
        tokio::fs::create_dir_all(&work_dir).await?;
        Ok(Self {
            job_id: job_id.to_string(),
            work_dir,
        })
    }

    async fn cleanup(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.work_dir).await {
            tracing::warn!(
                job_id = %self.job_id,
                path = %self.work_dir.display(),
                error = %e,
                "Failed to remove job working directory"
            );
        }
    }
}

/// Runs jobs through the stage sequence under a job-level concurrency bound.
pub struct PipelineOrchestrator {
    config: AppConfig,
    store: Arc<dyn AssetStore>,
    analyzer: Arc<dyn AudioAnalyzer>,
    analysis_cache: Mutex<AnalysisCache>,
    runner: Arc<dyn ProcessRunner>,
    caps: EncoderCaps,
    progress: Arc<dyn ProgressSink>,
    timing: TimingPlanner,
    transitions: TransitionPlanner,
    jobs: Semaphore,
}

impl PipelineOrchestrator {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AssetStore>,
        analyzer: Arc<dyn AudioAnalyzer>,
        runner: Arc<dyn ProcessRunner>,
        caps: EncoderCaps,
        progress: Arc<dyn ProgressSink>,
    ) -> BeatcutResult<Self> {
        let catalog = TransitionCatalog::load_embedded()?;
        let timing = TimingPlanner::new(TimingConfig {
            min_clip_secs: config.render.min_clip_secs,
            max_clip_secs: config.render.max_clip_secs,
            fallback_clip_secs: config.render.fallback_clip_secs,
        });
        let jobs = Semaphore::new(config.pipeline.max_concurrent_jobs.max(1));
        let analysis_cache = Mutex::new(AnalysisCache::new(config.pipeline.analysis_cache_capacity));

        Ok(Self {
            config,
            store,
            analyzer,
            analysis_cache,
            runner,
            caps,
            progress,
            timing,
            transitions: TransitionPlanner::new(catalog),
            jobs,
        })
    }

    /// Run one job to completion. Holds a job-level permit for the whole
    /// run, so at most `max_concurrent_jobs` jobs execute at once.
    pub async fn run_job(&self, request: JobRequest) -> BeatcutResult<JobOutcome> {
        let _permit = self
            .jobs
            .acquire()
            .await
            .map_err(|_| BeatcutError::render("orchestrator is shutting down"))?;

        let started = Utc::now();
        tracing::info!(job_id = %request.job_id, images = request.image_urls.len(), "Job started");

        let context = JobContext::create(&self.config.pipeline.work_root, &request.job_id).await?;
        let result = self.run_stages(&context, &request).await;
        context.cleanup().await;

        let elapsed = Utc::now() - started;
        match &result {
            Ok(outcome) => tracing::info!(
                job_id = %request.job_id,
                artifact = %outcome.artifact,
                elapsed_ms = elapsed.num_milliseconds(),
                "Job finished"
            ),
            Err(e) => tracing::error!(
                job_id = %request.job_id,
                error = %e,
                elapsed_ms = elapsed.num_milliseconds(),
                "Job failed"
            ),
        }
        result
    }

    async fn run_stages(
        &self,
        context: &JobContext,
        request: &JobRequest,
    ) -> BeatcutResult<JobOutcome> {
        let job_id = &request.job_id;

        // Acquire
        WIN_ACQUIRE.report(self.progress.as_ref(), job_id, 0, "acquiring assets");
        let (images, audio) = self.acquire(context, request).await?;
        WIN_ACQUIRE.report(self.progress.as_ref(), job_id, 100, "assets acquired");

        // Analyze
        WIN_ANALYZE.report(self.progress.as_ref(), job_id, 0, "analyzing audio");
        let analysis = self.analyze(request, audio.as_deref()).await;
        WIN_ANALYZE.report(self.progress.as_ref(), job_id, 100, "audio analyzed");

        // Plan
        WIN_PLAN.report(self.progress.as_ref(), job_id, 0, "planning");
        let plan = self.build_plan(request, &analysis, &images);
        WIN_PLAN.report(self.progress.as_ref(), job_id, 100, "planned");

        // GenerateClips
        WIN_CLIPS.report(self.progress.as_ref(), job_id, 0, "generating clips");
        let (plan, segments) = self.generate_clips(context, request, plan).await?;
        WIN_CLIPS.report(self.progress.as_ref(), job_id, 100, "clips generated");

        // Compose
        WIN_COMPOSE.report(self.progress.as_ref(), job_id, 0, "composing sequence");
        let composer = SequenceComposer::with_default_chain(
            Arc::clone(&self.runner),
            self.caps.clone(),
            self.caps.video_codec_args(plan.encoder),
        );
        let composed = context.work_dir.join("sequence.mp4");
        let mut current = composer.compose(&segments, &plan, &composed).await?;
        WIN_COMPOSE.report(self.progress.as_ref(), job_id, 100, "sequence composed");

        // Overlay
        WIN_OVERLAY.report(self.progress.as_ref(), job_id, 0, "applying overlay");
        if let Some(caption) = &request.caption {
            current = self.overlay(context, &current, caption).await;
        }
        WIN_OVERLAY.report(self.progress.as_ref(), job_id, 100, "overlay done");

        // MixAudio
        WIN_AUDIO.report(self.progress.as_ref(), job_id, 0, "mixing audio");
        if let Some(audio) = &audio {
            current = self.mix_audio(context, &current, audio).await;
        }
        WIN_AUDIO.report(self.progress.as_ref(), job_id, 100, "audio mixed");

        // VerifyDuration
        WIN_VERIFY.report(self.progress.as_ref(), job_id, 0, "verifying duration");
        current = self
            .verify_duration(context, &current, request.target_secs)
            .await;
        WIN_VERIFY.report(self.progress.as_ref(), job_id, 100, "duration verified");

        // Finalize
        WIN_FINALIZE.report(self.progress.as_ref(), job_id, 0, "publishing");
        let artifact = self.store.upload(&current, &request.output_key).await?;
        WIN_FINALIZE.report(self.progress.as_ref(), job_id, 100, "published");

        Ok(JobOutcome {
            job_id: job_id.clone(),
            artifact,
        })
    }

    /// Download source assets. Per-image failures degrade by duplicating
    /// successful downloads round-robin into the failed slots; the job is
    /// fatal only below the minimum viable image count. A missing audio
    /// track degrades to a silent, uniform-duration video.
    async fn acquire(
        &self,
        context: &JobContext,
        request: &JobRequest,
    ) -> BeatcutResult<(Vec<PathBuf>, Option<PathBuf>)> {
        let mut slots: Vec<Option<PathBuf>> = Vec::with_capacity(request.image_urls.len());
        for url in &request.image_urls {
            match self.store.download(url, &context.work_dir).await {
                Ok(path) => slots.push(Some(path)),
                Err(e) => {
                    tracing::warn!(job_id = %request.job_id, url, error = %e, "Image download failed");
                    slots.push(None);
                }
            }
        }

        let images = fill_missing_slots(slots, self.config.render.min_viable_images)?;

        let audio = match self
            .store
            .download(&request.audio_url, &context.work_dir)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(
                    job_id = %request.job_id,
                    url = %request.audio_url,
                    error = %e,
                    "Audio download failed, rendering without audio"
                );
                None
            }
        };

        Ok((images, audio))
    }

    /// Analysis is cached by source URL, not the per-job local path, so
    /// repeated jobs over the same track skip the collaborator entirely.
    async fn analyze(&self, request: &JobRequest, audio: Option<&Path>) -> AudioAnalysis {
        let Some(audio) = audio else {
            return AudioAnalysis::unavailable(request.target_secs);
        };

        if let Some(cached) = self.analysis_cache.lock().await.get(&request.audio_url) {
            tracing::debug!(job_id = %request.job_id, "Analysis cache hit");
            return cached.clone();
        }

        let deadline = Duration::from_secs(self.config.pipeline.analysis_timeout_secs);
        let analysis =
            analyze_with_deadline(self.analyzer.as_ref(), audio, deadline, request.target_secs)
                .await;

        if analysis.is_usable() {
            self.analysis_cache
                .lock()
                .await
                .insert(request.audio_url.clone(), analysis.clone());
        }
        analysis
    }

    fn build_plan(
        &self,
        request: &JobRequest,
        analysis: &AudioAnalysis,
        images: &[PathBuf],
    ) -> RenderPlan {
        let grid = BeatGrid::from_analysis(analysis);
        let clips = self.timing.plan(
            grid.as_ref(),
            request.target_secs,
            images,
            &request.motion_candidates,
        );
        let transitions = self.transitions.plan(
            &clips,
            &request.transition_candidates,
            self.config.render.transition_secs,
        );

        tracing::info!(
            job_id = %request.job_id,
            clips = clips.len(),
            transitions = transitions.len(),
            beat_synced = grid.is_some(),
            "Plan built"
        );

        RenderPlan {
            clips,
            transitions,
            geometry: OutputGeometry {
                width: self.config.render.width,
                height: self.config.render.height,
                fps: self.config.render.fps,
            },
            encoder: EncoderPreference::default(),
        }
    }

    /// Generate per-clip segments. Individual clip failures are isolated;
    /// when any occur the plan is rebuilt over the survivors so clip
    /// indices, start times, and transitions stay consistent. Fewer than
    /// two usable clips is fatal: one clip cannot take a transition.
    async fn generate_clips(
        &self,
        context: &JobContext,
        request: &JobRequest,
        plan: RenderPlan,
    ) -> BeatcutResult<(RenderPlan, Vec<Segment>)> {
        let generator = ClipGenerator::new(
            Arc::clone(&self.runner),
            plan.geometry,
            self.caps.video_codec_args(plan.encoder),
            self.config.render.clip_workers,
        );

        let batch = generator.generate_all(&plan.clips, &context.work_dir).await;
        if batch.segments.len() < 2 {
            return Err(BeatcutError::clip_generation(format!(
                "only {} of {} clips rendered, need at least 2",
                batch.segments.len(),
                plan.clips.len()
            )));
        }

        if batch.failures.is_empty() {
            return Ok((plan, batch.segments));
        }

        for failure in &batch.failures {
            tracing::warn!(
                job_id = %request.job_id,
                clip = failure.index,
                error = %failure.message,
                "Clip failed, continuing without it"
            );
        }
        Ok(self.rebuild_plan(plan, batch, &request.transition_candidates))
    }

    /// Rebuild the plan over surviving clips: contiguous start times, fresh
    /// indices, and re-planned transitions.
    fn rebuild_plan(
        &self,
        plan: RenderPlan,
        batch: ClipBatch,
        transition_candidates: &[String],
    ) -> (RenderPlan, Vec<Segment>) {
        let mut clips = Vec::with_capacity(batch.segments.len());
        let mut segments = Vec::with_capacity(batch.segments.len());
        let mut start_secs = 0.0;

        for (position, segment) in batch.segments.into_iter().enumerate() {
            let original = &plan.clips[segment.index];
            clips.push(ClipSpec {
                image: original.image.clone(),
                start_secs,
                duration_secs: original.duration_secs,
                motion: original.motion,
                index: position,
            });
            start_secs += original.duration_secs;
            segments.push(Segment {
                index: position,
                ..segment
            });
        }

        let transitions = self.transitions.plan(
            &clips,
            transition_candidates,
            self.config.render.transition_secs,
        );

        let rebuilt = RenderPlan {
            clips,
            transitions,
            geometry: plan.geometry,
            encoder: plan.encoder,
        };
        (rebuilt, segments)
    }

    /// Render the caption over the video. Failure skips the enhancement.
    async fn overlay(&self, context: &JobContext, input: &Path, caption: &str) -> PathBuf {
        let output = context.work_dir.join("overlaid.mp4");
        let filter = format!(
            "drawtext=text='{}':fontcolor=white:fontsize=64:borderw=2:bordercolor=black:\
             x=(w-text_w)/2:y=h*0.08",
            escape_drawtext(caption)
        );

        let mut args = string_args(&["-y", "-hide_banner", "-loglevel", "error", "-i"]);
        args.push(input.display().to_string());
        args.push("-vf".to_string());
        args.push(filter);
        args.extend(self.caps.video_codec_args(EncoderPreference::Cpu));
        args.extend(string_args(&["-an"]));
        args.push(output.display().to_string());

        match self.runner.run("ffmpeg", &args).await {
            Ok(out) if out.success() => output,
            Ok(out) => {
                tracing::warn!(stderr = %out.stderr.trim(), "Overlay failed, skipping");
                input.to_path_buf()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Overlay failed, skipping");
                input.to_path_buf()
            }
        }
    }

    /// Mux the audio track under the video. Failure ships a silent video.
    async fn mix_audio(&self, context: &JobContext, input: &Path, audio: &Path) -> PathBuf {
        let output = context.work_dir.join("with_audio.mp4");

        let mut args = string_args(&["-y", "-hide_banner", "-loglevel", "error", "-i"]);
        args.push(input.display().to_string());
        args.push("-i".to_string());
        args.push(audio.display().to_string());
        args.extend(string_args(&[
            "-map", "0:v", "-map", "1:a", "-c:v", "copy", "-c:a", "aac", "-b:a", "192k",
            "-shortest",
        ]));
        args.push(output.display().to_string());

        match self.runner.run("ffmpeg", &args).await {
            Ok(out) if out.success() => output,
            Ok(out) => {
                tracing::warn!(stderr = %out.stderr.trim(), "Audio mix failed, shipping silent video");
                input.to_path_buf()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Audio mix failed, shipping silent video");
                input.to_path_buf()
            }
        }
    }

    /// Probe the final duration and trim overshoot beyond the tolerance.
    /// A failed trim ships the untrimmed output.
    async fn verify_duration(&self, context: &JobContext, input: &Path, target_secs: f64) -> PathBuf {
        let actual = match probe::probe_duration(self.runner.as_ref(), input).await {
            Ok(secs) => secs,
            Err(e) => {
                tracing::warn!(error = %e, "Duration probe failed, skipping verification");
                return input.to_path_buf();
            }
        };

        let tolerance = self.config.render.duration_tolerance_secs;
        if actual <= target_secs + tolerance {
            return input.to_path_buf();
        }

        tracing::info!(actual, target = target_secs, "Output over target, trimming");
        let output = context.work_dir.join("trimmed.mp4");
        let mut args = string_args(&["-y", "-hide_banner", "-loglevel", "error", "-i"]);
        args.push(input.display().to_string());
        args.push("-t".to_string());
        args.push(format!("{target_secs:.3}"));
        args.extend(string_args(&["-c", "copy"]));
        args.push(output.display().to_string());

        match self.runner.run("ffmpeg", &args).await {
            Ok(out) if out.success() => output,
            Ok(out) => {
                tracing::warn!(stderr = %out.stderr.trim(), "Trim failed, shipping untrimmed output");
                input.to_path_buf()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Trim failed, shipping untrimmed output");
                input.to_path_buf()
            }
        }
    }
}

/// Fill failed download slots by cycling the successful ones, preserving
/// request order. Errors below the minimum viable count.
fn fill_missing_slots(
    slots: Vec<Option<PathBuf>>,
    min_viable: usize,
) -> BeatcutResult<Vec<PathBuf>> {
    let successes: Vec<PathBuf> = slots.iter().flatten().cloned().collect();
    if successes.len() < min_viable {
        return Err(BeatcutError::acquisition(format!(
            "only {} of {} images acquired, need {}",
            successes.len(),
            slots.len(),
            min_viable
        )));
    }

    let mut next = 0usize;
    let filled = slots
        .into_iter()
        .map(|slot| match slot {
            Some(path) => path,
            None => {
                let substitute = successes[next % successes.len()].clone();
                next += 1;
                substitute
            }
        })
        .collect();
    Ok(filled)
}

/// Escape characters that terminate or delimit a drawtext argument.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
}

fn string_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
