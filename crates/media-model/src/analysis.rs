//! Audio analysis results and the derived beat grid.
//!
//! `AudioAnalysis` is produced once per job by an external collaborator and
//! treated as immutable input. `BeatGrid` is the read-only lookup structure
//! the planners work against; its lifetime is one render job.

use serde::{Deserialize, Serialize};

/// Tempo and beat data detected for one audio track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    /// Detected tempo in beats per minute.
    pub bpm: f64,

    /// Beat timestamps in seconds, strictly increasing.
    pub beat_times: Vec<f64>,

    /// Total duration of the audio track in seconds.
    pub duration_secs: f64,
}

impl AudioAnalysis {
    /// Whether this analysis carries enough beat data to drive beat-exact
    /// timing. Unusable analyses fall back to uniform clip durations.
    pub fn is_usable(&self) -> bool {
        self.bpm > 0.0 && self.beat_times.len() >= 2 && strictly_increasing(&self.beat_times)
    }

    /// A neutral analysis substituted when the collaborator fails or times
    /// out. Never usable; downstream planners take the uniform fallback.
    pub fn unavailable(duration_secs: f64) -> Self {
        Self {
            bpm: 0.0,
            beat_times: vec![],
            duration_secs,
        }
    }
}

fn strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

/// Read-only beat lookup derived from a usable [`AudioAnalysis`].
#[derive(Debug, Clone)]
pub struct BeatGrid {
    bpm: f64,
    beat_times: Vec<f64>,
}

impl BeatGrid {
    /// Build a grid from an analysis. Returns `None` when the analysis is
    /// not usable, so callers are forced through the fallback path.
    pub fn from_analysis(analysis: &AudioAnalysis) -> Option<Self> {
        if !analysis.is_usable() {
            return None;
        }
        Some(Self {
            bpm: analysis.bpm,
            beat_times: analysis.beat_times.clone(),
        })
    }

    /// Nominal interval between beats in seconds (`60 / bpm`).
    pub fn beat_interval(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Number of beats in the grid.
    pub fn beat_count(&self) -> usize {
        self.beat_times.len()
    }

    /// Timestamp of beat `index`, if present.
    pub fn beat_at(&self, index: usize) -> Option<f64> {
        self.beat_times.get(index).copied()
    }

    /// The beat closest to `t`, if one lies within `tolerance` seconds.
    pub fn nearest_beat(&self, t: f64, tolerance: f64) -> Option<f64> {
        let idx = self
            .beat_times
            .partition_point(|&b| b < t)
            .min(self.beat_times.len() - 1);

        let mut best = self.beat_times[idx];
        if idx > 0 && (t - self.beat_times[idx - 1]).abs() < (best - t).abs() {
            best = self.beat_times[idx - 1];
        }

        ((best - t).abs() <= tolerance).then_some(best)
    }

    /// All beats in the half-open range `[start, end)`.
    pub fn beats_in_range(&self, start: f64, end: f64) -> &[f64] {
        let lo = self.beat_times.partition_point(|&b| b < start);
        let hi = self.beat_times.partition_point(|&b| b < end);
        &self.beat_times[lo..hi]
    }
}
