//! Beatcut Pipeline
//!
//! Orchestrates whole render jobs end to end:
//! - **Assets:** acquisition and publication collaborator
//! - **Analysis:** audio analysis collaborator, deadline, bounded cache
//! - **Progress:** advisory progress sinks and stage windows
//! - **Orchestrator:** the fixed stage sequence with per-stage failure
//!   policies and a job-level concurrency bound

pub mod analysis;
pub mod assets;
pub mod orchestrator;
pub mod progress;

pub use analysis::{analyze_with_deadline, AnalysisCache, AudioAnalyzer};
pub use assets::{AssetStore, HttpAssetStore, LocalAssetStore};
pub use orchestrator::{JobOutcome, JobRequest, PipelineOrchestrator};
pub use progress::{LogProgressSink, NullProgressSink, ProgressSink, StageWindow};
