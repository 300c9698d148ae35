//! Clip and transition specs, and the assembled render plan.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Motion applied to a still image over its clip duration (Ken Burns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MotionStyle {
    ZoomIn,
    ZoomOut,
    Pan,
    #[default]
    Static,
}

impl MotionStyle {
    /// Parse an untrusted motion identifier from the effect-selection
    /// collaborator. Unknown identifiers map by family so a bad selector
    /// list can never fail a job: anything zoom-like keeps its direction,
    /// pan/slide-like motion becomes `Pan`, everything else is `Static`.
    pub fn from_identifier(raw: &str) -> Self {
        let id = raw.trim().to_ascii_lowercase();
        match id.as_str() {
            "zoom_in" | "zoomin" | "ken_burns_in" => Self::ZoomIn,
            "zoom_out" | "zoomout" | "ken_burns_out" => Self::ZoomOut,
            "pan" | "pan_left" | "pan_right" => Self::Pan,
            "static" | "none" | "hold" => Self::Static,
            _ if id.contains("zoom") && id.contains("out") => Self::ZoomOut,
            _ if id.contains("zoom") => Self::ZoomIn,
            _ if id.contains("pan") || id.contains("slide") => Self::Pan,
            _ => Self::Static,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZoomIn => "zoom_in",
            Self::ZoomOut => "zoom_out",
            Self::Pan => "pan",
            Self::Static => "static",
        }
    }
}

/// One clip of the output: a still image animated over a beat-exact span.
///
/// Invariant: for consecutive clips,
/// `clips[i].start_secs + clips[i].duration_secs == clips[i+1].start_secs`
/// before transition overlap is subtracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    /// Source image on local disk.
    pub image: PathBuf,

    /// Start time in the output timeline (seconds).
    pub start_secs: f64,

    /// Clip duration (seconds), always > 0.
    pub duration_secs: f64,

    /// Motion applied to the image.
    pub motion: MotionStyle,

    /// Zero-based playback order. Also determines the segment file name,
    /// so ordering is recoverable regardless of generation completion order.
    pub index: usize,
}

impl ClipSpec {
    /// End time in the output timeline (seconds).
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }
}

/// A planned transition between two adjacent clips.
///
/// `kind` is always drawn from the transition catalog's allow-list by the
/// time a spec exists; deny-listed and unknown identifiers are substituted
/// during planning, never passed through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    /// Index of the outgoing clip.
    pub from_index: usize,

    /// Index of the incoming clip.
    pub to_index: usize,

    /// Resolved transition kind (catalog identifier).
    pub kind: String,

    /// Transition duration (seconds), clamped to the kind's bounds.
    pub duration_secs: f64,

    /// Offset in the composed timeline at which the transition starts.
    pub start_offset_secs: f64,
}

/// Output geometry for the rendered video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for OutputGeometry {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }
}

/// Preferred encoder class; the render engine falls back to CPU encoding
/// when accelerated encoding is not available on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncoderPreference {
    #[default]
    Gpu,
    Cpu,
}

/// The complete, read-only plan for one render job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderPlan {
    /// Ordered clips.
    pub clips: Vec<ClipSpec>,

    /// Ordered transitions, one per adjacent clip pair (`clips.len() - 1`,
    /// or empty when there are fewer than two clips).
    pub transitions: Vec<TransitionSpec>,

    /// Target output geometry.
    pub geometry: OutputGeometry,

    /// Encoder preference.
    pub encoder: EncoderPreference,
}

impl RenderPlan {
    /// Total planned duration before transition overlap is subtracted.
    pub fn gross_duration_secs(&self) -> f64 {
        self.clips.iter().map(|c| c.duration_secs).sum()
    }

    /// Total planned duration after transition overlap is subtracted.
    pub fn net_duration_secs(&self) -> f64 {
        let overlap: f64 = self.transitions.iter().map(|t| t.duration_secs).sum();
        self.gross_duration_secs() - overlap
    }
}
