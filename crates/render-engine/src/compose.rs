//! Sequence composition: renderer backends and the fallback chain.
//!
//! Backends are ordered highest-quality first and tried whole-sequence at a
//! time. Per-transition retries are deliberately avoided: intermediate
//! filter-graph state cannot be cleanly resumed, so a failed attempt moves
//! the entire composition to the next backend.
//!
//! Chain: GPU shader (OpenCL xfade) → external-tool crossfade → naive
//! concatenation. The terminal concat backend produces a correct but
//! transition-less video and must never fail on valid segments.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use beatcut_common::{BeatcutError, BeatcutResult};
use beatcut_media_model::RenderPlan;

use crate::clip::Segment;
use crate::encoders::{flags, EncoderCaps};
use crate::runner::ProcessRunner;

/// One concrete strategy for producing a composed video from segments and a
/// transition plan.
#[async_trait]
pub trait ComposeBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Capability probe. An unavailable backend is skipped without being
    /// counted as a failure.
    async fn available(&self) -> bool;

    async fn compose(
        &self,
        segments: &[Segment],
        plan: &RenderPlan,
        output: &Path,
    ) -> BeatcutResult<()>;
}

/// Iterates the backend chain until one produces a usable output file.
pub struct SequenceComposer {
    backends: Vec<Box<dyn ComposeBackend>>,
}

impl SequenceComposer {
    /// The standard chain: GPU shader, then CPU crossfade, then concat.
    pub fn with_default_chain(
        runner: Arc<dyn ProcessRunner>,
        caps: EncoderCaps,
        encoder_args: Vec<String>,
    ) -> Self {
        Self {
            backends: vec![
                Box::new(GpuShaderBackend::new(
                    Arc::clone(&runner),
                    caps,
                    encoder_args.clone(),
                )),
                Box::new(XfadeBackend::new(Arc::clone(&runner), encoder_args)),
                Box::new(ConcatBackend::new(runner)),
            ],
        }
    }

    /// Custom chain, primarily for tests.
    pub fn from_backends(backends: Vec<Box<dyn ComposeBackend>>) -> Self {
        Self { backends }
    }

    /// Compose `segments` into one continuous video at `output`.
    ///
    /// Segments must be in clip-index order. Errors only when every backend
    /// in the chain has failed.
    pub async fn compose(
        &self,
        segments: &[Segment],
        plan: &RenderPlan,
        output: &Path,
    ) -> BeatcutResult<PathBuf> {
        if segments.is_empty() {
            return Err(BeatcutError::compose("no segments to compose"));
        }
        debug_assert!(segments.windows(2).all(|w| w[0].index < w[1].index));

        for backend in &self.backends {
            if !backend.available().await {
                tracing::debug!(backend = backend.name(), "Backend unavailable, skipping");
                continue;
            }

            match backend.compose(segments, plan, output).await {
                Ok(()) => {
                    if output_usable(output).await {
                        tracing::info!(backend = backend.name(), "Sequence composed");
                        return Ok(output.to_path_buf());
                    }
                    tracing::warn!(
                        backend = backend.name(),
                        "Backend reported success but produced no usable output, falling back"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        error = %e,
                        "Compose attempt failed, falling back to next backend"
                    );
                }
            }
        }

        Err(BeatcutError::compose(
            "every compose backend in the chain failed",
        ))
    }
}

async fn output_usable(path: &Path) -> bool {
    matches!(tokio::fs::metadata(path).await, Ok(meta) if meta.len() > 0)
}

/// CPU crossfade backend: one external-tool process per attempt, chaining
/// one xfade per adjacent pair in a single filter-graph expression.
pub struct XfadeBackend {
    runner: Arc<dyn ProcessRunner>,
    encoder_args: Vec<String>,
}

impl XfadeBackend {
    pub fn new(runner: Arc<dyn ProcessRunner>, encoder_args: Vec<String>) -> Self {
        Self {
            runner,
            encoder_args,
        }
    }
}

#[async_trait]
impl ComposeBackend for XfadeBackend {
    fn name(&self) -> &str {
        "xfade"
    }

    async fn available(&self) -> bool {
        true
    }

    async fn compose(
        &self,
        segments: &[Segment],
        plan: &RenderPlan,
        output: &Path,
    ) -> BeatcutResult<()> {
        if segments.len() == 1 {
            // Nothing to crossfade; hand the single segment to a remux.
            return remux_single(self.runner.as_ref(), &segments[0], output).await;
        }

        let filter = build_xfade_filter(segments, plan, false)?;

        let mut args = flags(&["-y", "-hide_banner", "-loglevel", "error"]);
        for segment in segments {
            args.push("-i".to_string());
            args.push(segment.path.display().to_string());
        }
        args.push("-filter_complex".to_string());
        args.push(filter);
        args.extend(flags(&["-map", "[vout]", "-r"]));
        args.push(plan.geometry.fps.to_string());
        args.extend(self.encoder_args.iter().cloned());
        args.push(output.display().to_string());

        run_expecting_success(self.runner.as_ref(), "ffmpeg", &args).await
    }
}

/// GPU shader backend: the same crossfade chain executed as OpenCL xfade on
/// an accelerated filter device. Only attempted when the capability probe
/// succeeded.
pub struct GpuShaderBackend {
    runner: Arc<dyn ProcessRunner>,
    caps: EncoderCaps,
    encoder_args: Vec<String>,
}

impl GpuShaderBackend {
    pub fn new(runner: Arc<dyn ProcessRunner>, caps: EncoderCaps, encoder_args: Vec<String>) -> Self {
        Self {
            runner,
            caps,
            encoder_args,
        }
    }
}

#[async_trait]
impl ComposeBackend for GpuShaderBackend {
    fn name(&self) -> &str {
        "gpu-shader"
    }

    async fn available(&self) -> bool {
        self.caps.has_gpu_pipeline()
    }

    async fn compose(
        &self,
        segments: &[Segment],
        plan: &RenderPlan,
        output: &Path,
    ) -> BeatcutResult<()> {
        if segments.len() == 1 {
            return remux_single(self.runner.as_ref(), &segments[0], output).await;
        }

        let filter = build_xfade_filter(segments, plan, true)?;

        let mut args = flags(&[
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-init_hw_device",
            "opencl=gpu:0.0",
            "-filter_hw_device",
            "gpu",
        ]);
        for segment in segments {
            args.push("-i".to_string());
            args.push(segment.path.display().to_string());
        }
        args.push("-filter_complex".to_string());
        args.push(filter);
        args.extend(flags(&["-map", "[vout]", "-r"]));
        args.push(plan.geometry.fps.to_string());
        args.extend(self.encoder_args.iter().cloned());
        args.push(output.display().to_string());

        run_expecting_success(self.runner.as_ref(), "ffmpeg", &args).await
    }
}

/// Terminal fallback: direct stream concatenation, no transitions. Always
/// succeeds when every input segment is valid.
pub struct ConcatBackend {
    runner: Arc<dyn ProcessRunner>,
}

impl ConcatBackend {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ComposeBackend for ConcatBackend {
    fn name(&self) -> &str {
        "concat"
    }

    async fn available(&self) -> bool {
        true
    }

    async fn compose(
        &self,
        segments: &[Segment],
        _plan: &RenderPlan,
        output: &Path,
    ) -> BeatcutResult<()> {
        let list_path = output.with_extension("concat.txt");
        let list = segments
            .iter()
            .map(|s| format!("file '{}'", s.path.display()))
            .collect::<Vec<_>>()
            .join("\n");
        tokio::fs::write(&list_path, list).await?;

        let mut args = flags(&[
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
        ]);
        args.push(list_path.display().to_string());
        args.extend(flags(&["-c", "copy"]));
        args.push(output.display().to_string());

        run_expecting_success(self.runner.as_ref(), "ffmpeg", &args).await
    }
}

/// Build the crossfade filter-graph expression.
///
/// Offsets come straight from the transition plan (beat-exact running sums),
/// never recomputed under a uniform-duration assumption. Transition indices
/// are positional: pair `i` joins `segments[i]` and `segments[i+1]`.
fn build_xfade_filter(
    segments: &[Segment],
    plan: &RenderPlan,
    opencl: bool,
) -> BeatcutResult<String> {
    let pairs = segments.len() - 1;
    if plan.transitions.len() < pairs {
        return Err(BeatcutError::compose(format!(
            "transition plan covers {} pairs but {} are needed",
            plan.transitions.len(),
            pairs
        )));
    }

    let mut graph = String::new();
    let filter = if opencl { "xfade_opencl" } else { "xfade" };

    if opencl {
        for i in 0..segments.len() {
            graph.push_str(&format!("[{i}:v]format=yuv420p,hwupload[g{i}];"));
        }
    }

    let input_label = |i: usize| {
        if opencl {
            format!("[g{i}]")
        } else {
            format!("[{i}:v]")
        }
    };

    let mut previous = input_label(0);
    for i in 0..pairs {
        let spec = &plan.transitions[i];
        let out_label = if i == pairs - 1 {
            "[chain]".to_string()
        } else {
            format!("[x{}]", i + 1)
        };

        graph.push_str(&format!(
            "{previous}{next}{filter}=transition={kind}:duration={duration:.3}:offset={offset:.3}{out};",
            next = input_label(i + 1),
            kind = spec.kind,
            duration = spec.duration_secs,
            offset = spec.start_offset_secs,
            out = out_label,
        ));
        previous = out_label;
    }

    if opencl {
        graph.push_str("[chain]hwdownload,format=yuv420p[vout]");
    } else {
        graph.push_str("[chain]format=yuv420p[vout]");
    }

    Ok(graph)
}

async fn remux_single(
    runner: &dyn ProcessRunner,
    segment: &Segment,
    output: &Path,
) -> BeatcutResult<()> {
    let mut args = flags(&["-y", "-hide_banner", "-loglevel", "error", "-i"]);
    args.push(segment.path.display().to_string());
    args.extend(flags(&["-c", "copy"]));
    args.push(output.display().to_string());
    run_expecting_success(runner, "ffmpeg", &args).await
}

async fn run_expecting_success(
    runner: &dyn ProcessRunner,
    program: &str,
    args: &[String],
) -> BeatcutResult<()> {
    let out = runner.run(program, args).await?;
    if !out.success() {
        return Err(BeatcutError::compose(format!(
            "{program} exited {}: {}",
            out.status,
            out.stderr.trim()
        )));
    }
    Ok(())
}
