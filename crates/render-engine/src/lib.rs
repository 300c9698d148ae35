//! Beatcut Render Engine
//!
//! Executes render plans against the external media tool (ffmpeg):
//! - **Runner:** narrow subprocess interface so planning/composition logic
//!   is unit-testable against a fake
//! - **Probe:** ffprobe helpers for duration and geometry
//! - **Encoders:** process-wide encoder capability detection
//! - **Clip:** bounded-parallel generation of per-clip segments
//! - **Compose:** the renderer backend chain (GPU shader, xfade, concat)

pub mod clip;
pub mod compose;
pub mod encoders;
pub mod probe;
pub mod runner;

pub use clip::{ClipBatch, ClipFailure, ClipGenerator, Segment};
pub use compose::{ComposeBackend, ConcatBackend, GpuShaderBackend, SequenceComposer, XfadeBackend};
pub use encoders::EncoderCaps;
pub use runner::{ProcessRunner, RunOutput, SystemRunner};
