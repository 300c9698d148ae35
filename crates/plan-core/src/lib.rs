//! Beatcut Plan Core
//!
//! The pure planning layer of the render pipeline:
//! - **Timing:** converts a beat grid into beat-exact per-clip durations
//! - **Catalog:** the data-driven allow/deny list of transition kinds
//! - **Transitions:** sequences validated transitions between adjacent clips
//!
//! Nothing in this crate touches the filesystem or spawns processes; plans
//! are handed to `beatcut-render-engine` for execution.

pub mod catalog;
pub mod timing;
pub mod transitions;

pub use catalog::{Resolution, TransitionCatalog, TransitionEntry, TransitionFamily};
pub use timing::{TimingConfig, TimingPlanner};
pub use transitions::TransitionPlanner;
