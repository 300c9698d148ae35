//! Beatcut Media Model
//!
//! Defines the core data contracts for a beat-synchronized render job:
//! - **Analysis:** Detected tempo and beat timestamps, and the derived beat grid
//! - **Plan:** Per-clip specs, transition specs, and the assembled render plan
//!
//! All times are in seconds from the start of the audio track. Types in this
//! crate are immutable once constructed and carry no execution behavior.

pub mod analysis;
pub mod plan;

pub use analysis::*;
pub use plan::*;
