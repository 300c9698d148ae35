//! Beat-synchronized timing: the "beats-per-clip" duration planner.
//!
//! Converts a detected beat grid into an ordered list of per-clip durations
//! that stay perceptually locked to the music.
//!
//! # Algorithm
//!
//! 1. **Score** each candidate beats-per-clip in `{1, 2, 3, 4}` against the
//!    configured per-clip duration bounds and pick the best.
//! 2. **Count** clips: enough to fill the target duration, capped by how many
//!    whole beat spans the grid actually contains.
//! 3. **Measure** each clip from the actual beat timestamps (beat-exact
//!    spans, not the nominal tempo estimate).
//! 4. **Fall back** to uniform durations when beat data is unusable.

use std::path::PathBuf;

use beatcut_media_model::{BeatGrid, ClipSpec, MotionStyle};

/// Score of a candidate duration that sits inside the configured bounds.
const IN_BOUNDS_SCORE: f64 = 100.0;
/// Penalty per second of shortfall below the minimum bound. Overly fast
/// cuts read as broken, so the short side decays twice as steeply.
const BELOW_MIN_PENALTY_PER_SEC: f64 = 120.0;
/// Penalty per second of overshoot above the maximum bound.
const ABOVE_MAX_PENALTY_PER_SEC: f64 = 60.0;

const CANDIDATE_BEATS_PER_CLIP: [usize; 4] = [1, 2, 3, 4];

/// Configuration for the timing planner.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Minimum acceptable per-clip duration (seconds).
    pub min_clip_secs: f64,

    /// Maximum acceptable per-clip duration (seconds).
    pub max_clip_secs: f64,

    /// Uniform duration used when beat data is absent or invalid (seconds).
    pub fallback_clip_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_clip_secs: 1.0,
            max_clip_secs: 1.5,
            fallback_clip_secs: 0.6,
        }
    }
}

/// The timing planner.
///
/// This stage never fails: given at least one image it always produces at
/// least one clip, falling back to uniform durations when the beat grid is
/// unusable.
pub struct TimingPlanner {
    config: TimingConfig,
}

impl TimingPlanner {
    pub fn new(config: TimingConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(TimingConfig::default())
    }

    /// Plan clips for `target_secs` of output over the given images.
    ///
    /// `motion_candidates` is the ranked, untrusted motion-style list from
    /// the effect-selection collaborator; it cycles across clips, and an
    /// empty list alternates zoom-in/zoom-out by clip parity.
    ///
    /// `images` must be non-empty; the orchestrator enforces the minimum
    /// viable image count before planning.
    pub fn plan(
        &self,
        grid: Option<&BeatGrid>,
        target_secs: f64,
        images: &[PathBuf],
        motion_candidates: &[String],
    ) -> Vec<ClipSpec> {
        let durations = match grid {
            Some(grid) => self.beat_exact_durations(grid, target_secs),
            None => self.uniform_durations(target_secs),
        };

        let motions: Vec<MotionStyle> = motion_candidates
            .iter()
            .map(|raw| MotionStyle::from_identifier(raw))
            .collect();

        let mut clips = Vec::with_capacity(durations.len());
        let mut start_secs = 0.0;
        for (i, duration_secs) in durations.into_iter().enumerate() {
            let motion = if motions.is_empty() {
                if i % 2 == 0 {
                    MotionStyle::ZoomIn
                } else {
                    MotionStyle::ZoomOut
                }
            } else {
                motions[i % motions.len()]
            };

            clips.push(ClipSpec {
                image: images[i % images.len()].clone(),
                start_secs,
                duration_secs,
                motion,
                index: i,
            });
            start_secs += duration_secs;
        }

        clips
    }

    /// Pick the beats-per-clip whose nominal duration best fits the bounds.
    pub fn choose_beats_per_clip(&self, beat_interval: f64) -> usize {
        let mut best = CANDIDATE_BEATS_PER_CLIP[0];
        let mut best_score = f64::NEG_INFINITY;
        let mut best_mid_dist = f64::INFINITY;
        let midpoint = (self.config.min_clip_secs + self.config.max_clip_secs) / 2.0;

        for &bpc in &CANDIDATE_BEATS_PER_CLIP {
            let duration = beat_interval * bpc as f64;
            let score = self.score_duration(duration);
            let mid_dist = (duration - midpoint).abs();

            // Ties break toward the bound midpoint; an exact midpoint tie
            // prefers the longer span (slower cuts over faster ones).
            let better = score > best_score + 1e-9
                || (score > best_score - 1e-9 && mid_dist < best_mid_dist - 1e-9)
                || (score > best_score - 1e-9 && (mid_dist - best_mid_dist).abs() <= 1e-9);
            if better {
                best = bpc;
                best_score = score.max(best_score);
                best_mid_dist = mid_dist.min(best_mid_dist);
            }
        }

        best
    }

    fn score_duration(&self, duration: f64) -> f64 {
        if duration < self.config.min_clip_secs {
            IN_BOUNDS_SCORE - (self.config.min_clip_secs - duration) * BELOW_MIN_PENALTY_PER_SEC
        } else if duration > self.config.max_clip_secs {
            IN_BOUNDS_SCORE - (duration - self.config.max_clip_secs) * ABOVE_MAX_PENALTY_PER_SEC
        } else {
            IN_BOUNDS_SCORE
        }
    }

    fn beat_exact_durations(&self, grid: &BeatGrid, target_secs: f64) -> Vec<f64> {
        let bpc = self.choose_beats_per_clip(grid.beat_interval());
        let estimated = grid.beat_interval() * bpc as f64;

        // Prefer filling the target duration over only using beats before it;
        // audio tracks are frequently longer than the requested output.
        let min_clips_needed = ((target_secs / estimated) - 1e-9).ceil() as usize;
        let max_clips_from_grid = (grid.beat_count() - 1) / bpc;
        let num_clips = min_clips_needed.min(max_clips_from_grid).max(1);

        if max_clips_from_grid == 0 {
            tracing::debug!(
                beats = grid.beat_count(),
                beats_per_clip = bpc,
                "Beat grid too short for one clip span, using uniform fallback"
            );
            return self.uniform_durations(target_secs);
        }

        tracing::debug!(
            beats_per_clip = bpc,
            estimated_clip_secs = estimated,
            num_clips,
            "Beat-exact timing plan"
        );

        (0..num_clips)
            .map(|i| {
                // Exact beat-to-beat span; intervals vary slightly beat to
                // beat and playback must stay locked to the actual audio.
                let start = grid.beat_at(i * bpc).expect("clip start beat in grid");
                let end = grid.beat_at((i + 1) * bpc).expect("clip end beat in grid");
                end - start
            })
            .collect()
    }

    fn uniform_durations(&self, target_secs: f64) -> Vec<f64> {
        let duration = self.config.fallback_clip_secs;
        // Epsilon so near-integer quotients (6.0 / 0.6) floor to the
        // intended clip count.
        let num_clips = (((target_secs / duration) + 1e-9).floor() as usize).max(1);
        vec![duration; num_clips]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatcut_media_model::AudioAnalysis;

    fn grid(bpm: f64, beat_count: usize) -> BeatGrid {
        let interval = 60.0 / bpm;
        let analysis = AudioAnalysis {
            bpm,
            beat_times: (0..beat_count).map(|i| i as f64 * interval).collect(),
            duration_secs: beat_count as f64 * interval,
        };
        BeatGrid::from_analysis(&analysis).unwrap()
    }

    fn image_paths(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("img_{i}.jpg"))).collect()
    }

    #[test]
    fn test_scenario_120bpm_resolves_three_beats_per_clip() {
        // 120 BPM, beats every 0.5s up to 20s, target 15s, bounds [1.0, 1.5]:
        // both 2 and 3 beats/clip land in bounds equidistant from the
        // midpoint; the longer span wins.
        let planner = TimingPlanner::with_defaults();
        assert_eq!(planner.choose_beats_per_clip(0.5), 3);

        let clips = planner.plan(Some(&grid(120.0, 41)), 15.0, &image_paths(8), &[]);
        assert_eq!(clips.len(), 10);
        for clip in &clips {
            assert!((clip.duration_secs - 1.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fast_tempo_groups_beats() {
        // 180 BPM: one beat is 0.333s, four beats is 1.333s (in bounds).
        let planner = TimingPlanner::with_defaults();
        assert_eq!(planner.choose_beats_per_clip(60.0 / 180.0), 4);
    }

    #[test]
    fn test_slow_tempo_uses_single_beats() {
        // 50 BPM: one beat is 1.2s, already inside the bounds.
        let planner = TimingPlanner::with_defaults();
        assert_eq!(planner.choose_beats_per_clip(1.2), 1);
    }

    #[test]
    fn test_contiguity_invariant() {
        let planner = TimingPlanner::with_defaults();
        let clips = planner.plan(Some(&grid(97.0, 60)), 20.0, &image_paths(5), &[]);

        assert!(clips.len() > 1);
        for pair in clips.windows(2) {
            assert!((pair[0].end_secs() - pair[1].start_secs).abs() < 1e-9);
        }
    }

    #[test]
    fn test_short_grid_caps_clip_count() {
        // Only 7 beats at 120 BPM: floor(6 / 3) = 2 clips, even though the
        // target would ask for far more.
        let planner = TimingPlanner::with_defaults();
        let clips = planner.plan(Some(&grid(120.0, 7)), 30.0, &image_paths(4), &[]);
        assert_eq!(clips.len(), 2);
    }

    #[test]
    fn test_uniform_fallback_without_grid() {
        let planner = TimingPlanner::with_defaults();
        let clips = planner.plan(None, 6.0, &image_paths(4), &[]);

        assert_eq!(clips.len(), 10); // floor(6.0 / 0.6)
        for clip in &clips {
            assert!((clip.duration_secs - 0.6).abs() < 1e-9);
        }
    }

    #[test]
    fn test_tiny_target_still_produces_one_clip() {
        let planner = TimingPlanner::with_defaults();
        let clips = planner.plan(None, 0.1, &image_paths(1), &[]);
        assert_eq!(clips.len(), 1);
    }

    #[test]
    fn test_images_loop_by_index() {
        let planner = TimingPlanner::with_defaults();
        let images = image_paths(3);
        let clips = planner.plan(None, 6.0, &images, &[]);

        for clip in &clips {
            assert_eq!(clip.image, images[clip.index % 3]);
        }
    }

    #[test]
    fn test_motion_candidates_cycle() {
        let planner = TimingPlanner::with_defaults();
        let motions = vec!["zoom_in".to_string(), "pan".to_string()];
        let clips = planner.plan(None, 3.0, &image_paths(2), &motions);

        assert_eq!(clips[0].motion, MotionStyle::ZoomIn);
        assert_eq!(clips[1].motion, MotionStyle::Pan);
        assert_eq!(clips[2].motion, MotionStyle::ZoomIn);
    }

    #[test]
    fn test_empty_motion_list_alternates_ken_burns() {
        let planner = TimingPlanner::with_defaults();
        let clips = planner.plan(None, 3.0, &image_paths(2), &[]);

        assert_eq!(clips[0].motion, MotionStyle::ZoomIn);
        assert_eq!(clips[1].motion, MotionStyle::ZoomOut);
    }
}
