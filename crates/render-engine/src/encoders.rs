//! Encoder and filter capability detection.
//!
//! Hardware capability does not change at runtime, so the probe runs once
//! and the result lives for the process lifetime. The service is explicitly
//! constructed and injected (never module-global state) so tests can build
//! one with whatever capabilities they need.

use beatcut_media_model::EncoderPreference;

use crate::runner::ProcessRunner;

/// GPU encoder names probed for, in preference order.
const GPU_ENCODERS: [&str; 3] = ["h264_nvenc", "h264_videotoolbox", "h264_vaapi"];

/// Detected encoder and filter capabilities of the host's media tool.
#[derive(Debug, Clone)]
pub struct EncoderCaps {
    /// First available GPU H.264 encoder, if any.
    gpu_encoder: Option<String>,

    /// Whether OpenCL-accelerated filters (xfade_opencl) are available.
    opencl_filters: bool,
}

impl EncoderCaps {
    /// Probe the host once. Call at process start and share the result.
    pub async fn detect(runner: &dyn ProcessRunner) -> Self {
        let gpu_encoder = match runner
            .run("ffmpeg", &flags(&["-hide_banner", "-encoders"]))
            .await
        {
            Ok(out) if out.success() => GPU_ENCODERS
                .iter()
                .find(|name| out.stdout.contains(*name))
                .map(|name| name.to_string()),
            _ => None,
        };

        let opencl_filters = match runner
            .run("ffmpeg", &flags(&["-hide_banner", "-filters"]))
            .await
        {
            Ok(out) if out.success() => out.stdout.contains("xfade_opencl"),
            _ => false,
        };

        tracing::info!(
            gpu_encoder = gpu_encoder.as_deref().unwrap_or("none"),
            opencl_filters,
            "Encoder capabilities detected"
        );

        Self {
            gpu_encoder,
            opencl_filters,
        }
    }

    /// Build a capability set directly (tests, forced-CPU deployments).
    pub fn fixed(gpu_encoder: Option<String>, opencl_filters: bool) -> Self {
        Self {
            gpu_encoder,
            opencl_filters,
        }
    }

    /// First available GPU H.264 encoder, if any.
    pub fn gpu_encoder(&self) -> Option<&str> {
        self.gpu_encoder.as_deref()
    }

    /// Whether the GPU shader compose backend can run at all.
    pub fn has_gpu_pipeline(&self) -> bool {
        self.opencl_filters && self.gpu_encoder.is_some()
    }

    /// Video codec arguments for the given preference, falling back to CPU
    /// encoding when accelerated encoding is unavailable.
    pub fn video_codec_args(&self, preference: EncoderPreference) -> Vec<String> {
        match (&self.gpu_encoder, preference) {
            (Some(encoder), EncoderPreference::Gpu) => flags(&[
                "-c:v", encoder, "-preset", "fast", "-pix_fmt", "yuv420p",
            ]),
            _ => flags(&[
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-profile:v",
                "high",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ]),
        }
    }
}

/// String-vector helper for building argument lists.
pub(crate) fn flags(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}
