//! Transition planning between adjacent clips.
//!
//! Takes the ranked candidate list from the effect-selection collaborator
//! (untrusted strings), validates every identifier against the catalog, and
//! produces one executable [`TransitionSpec`] per adjacent clip pair. Denied
//! and unknown kinds are substituted, never passed through; every
//! substitution is logged.

use beatcut_media_model::{ClipSpec, TransitionSpec};

use crate::catalog::{Resolution, TransitionCatalog, TransitionEntry};

/// The transition planner.
pub struct TransitionPlanner {
    catalog: TransitionCatalog,
}

impl TransitionPlanner {
    pub fn new(catalog: TransitionCatalog) -> Self {
        Self { catalog }
    }

    /// Plan one transition per adjacent clip pair.
    ///
    /// `candidates` cycles when shorter than `clips.len() - 1`; an empty
    /// list plans the safe default for every pair. `nominal_secs` is the
    /// requested transition duration before per-kind clamping.
    ///
    /// Start offsets are in the composed output timeline: the end of the
    /// outgoing clip minus all transition overlap accumulated so far. This
    /// is the beat-exact formula; it holds whether or not clip durations
    /// are uniform.
    pub fn plan(
        &self,
        clips: &[ClipSpec],
        candidates: &[String],
        nominal_secs: f64,
    ) -> Vec<TransitionSpec> {
        if clips.len() < 2 {
            return vec![];
        }

        let mut specs = Vec::with_capacity(clips.len() - 1);
        let mut overlap_so_far = 0.0;

        for i in 0..clips.len() - 1 {
            let requested = if candidates.is_empty() {
                self.catalog.safe_default().name.as_str()
            } else {
                candidates[i % candidates.len()].as_str()
            };

            let entry = self.resolve_or_substitute(requested, i);

            // The transition cannot outlast half of either adjacent clip.
            // The cap is strict: a floor here would let accumulated overlap
            // on very short clips push start offsets negative.
            let pair_cap = clips[i].duration_secs.min(clips[i + 1].duration_secs) / 2.0;
            let duration_secs = entry.clamp_duration(nominal_secs).min(pair_cap);

            overlap_so_far += duration_secs;
            let start_offset_secs = clips[i].end_secs() - overlap_so_far;

            specs.push(TransitionSpec {
                from_index: i,
                to_index: i + 1,
                kind: entry.name.clone(),
                duration_secs,
                start_offset_secs,
            });
        }

        specs
    }

    fn resolve_or_substitute(&self, requested: &str, pair_index: usize) -> &TransitionEntry {
        match self.catalog.resolve(requested) {
            Resolution::Safe(entry) => entry,
            Resolution::Denied(_) => {
                let fallback = self.catalog.safe_default();
                tracing::warn!(
                    requested,
                    substituted = %fallback.name,
                    pair_index,
                    "Deny-listed transition substituted"
                );
                fallback
            }
            Resolution::Unknown => {
                let fallback = match TransitionCatalog::guess_family(requested) {
                    Some(family) => self.catalog.family_fallback(family),
                    None => self.catalog.safe_default(),
                };
                tracing::info!(
                    requested,
                    substituted = %fallback.name,
                    pair_index,
                    "Unrecognized transition mapped to safe equivalent"
                );
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatcut_media_model::MotionStyle;
    use std::path::PathBuf;

    fn uniform_clips(n: usize, duration: f64) -> Vec<ClipSpec> {
        (0..n)
            .map(|i| ClipSpec {
                image: PathBuf::from(format!("img_{i}.jpg")),
                start_secs: i as f64 * duration,
                duration_secs: duration,
                motion: MotionStyle::Static,
                index: i,
            })
            .collect()
    }

    fn planner() -> TransitionPlanner {
        TransitionPlanner::new(TransitionCatalog::load_embedded().unwrap())
    }

    #[test]
    fn test_one_spec_per_adjacent_pair() {
        let specs = planner().plan(&uniform_clips(5, 1.5), &["fade".to_string()], 0.5);
        assert_eq!(specs.len(), 4);
        for (i, spec) in specs.iter().enumerate() {
            assert_eq!(spec.from_index, i);
            assert_eq!(spec.to_index, i + 1);
        }
    }

    #[test]
    fn test_candidates_cycle() {
        let candidates = vec!["fade".to_string(), "wipeleft".to_string()];
        let specs = planner().plan(&uniform_clips(5, 1.5), &candidates, 0.5);
        assert_eq!(specs[0].kind, "fade");
        assert_eq!(specs[1].kind, "wipeleft");
        assert_eq!(specs[2].kind, "fade");
        assert_eq!(specs[3].kind, "wipeleft");
    }

    #[test]
    fn test_denied_kind_substituted_with_fade() {
        let candidates = vec!["hlslice".to_string()];
        let specs = planner().plan(&uniform_clips(3, 1.5), &candidates, 0.5);
        assert!(specs.iter().all(|s| s.kind == "fade"));
    }

    #[test]
    fn test_unknown_kind_maps_by_family() {
        let candidates = vec![
            "hyper_wipe_42".to_string(),
            "soft_blur_morph".to_string(),
            "glitterstorm".to_string(),
        ];
        let specs = planner().plan(&uniform_clips(4, 1.5), &candidates, 0.5);
        assert_eq!(specs[0].kind, "wipeleft");
        assert_eq!(specs[1].kind, "dissolve");
        assert_eq!(specs[2].kind, "fade");
    }

    #[test]
    fn test_no_denied_kind_ever_emitted() {
        let catalog = TransitionCatalog::load_embedded().unwrap();
        let candidates: Vec<String> = vec![
            "hlslice", "hrslice", "vuslice", "vdslice", "hblur", "circlecrop", "rectcrop", "burn",
            "wipeleft", "what_is_this",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let specs = planner().plan(&uniform_clips(20, 1.5), &candidates, 0.5);
        for spec in &specs {
            assert!(matches!(catalog.resolve(&spec.kind), Resolution::Safe(_)));
        }
    }

    #[test]
    fn test_start_offsets_accumulate_overlap() {
        let specs = planner().plan(&uniform_clips(4, 1.5), &["fade".to_string()], 0.5);
        // offset(i) = (i+1)*1.5 - (i+1)*0.5 with uniform durations.
        for (i, spec) in specs.iter().enumerate() {
            let expected = (i + 1) as f64 * 1.5 - (i + 1) as f64 * 0.5;
            assert!((spec.start_offset_secs - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_offsets_nonnegative_and_inside_clip() {
        let clips = uniform_clips(8, 1.2);
        let specs = planner().plan(&clips, &["dissolve".to_string()], 0.6);
        for spec in &specs {
            assert!(spec.start_offset_secs >= 0.0);
            assert!(spec.start_offset_secs < clips[spec.from_index].end_secs());
        }
    }

    #[test]
    fn test_duration_clamped_to_kind_range() {
        let specs = planner().plan(&uniform_clips(3, 4.0), &["wipeleft".to_string()], 5.0);
        // wipeleft caps at 0.8s regardless of the nominal request.
        assert!(specs.iter().all(|s| (s.duration_secs - 0.8).abs() < 1e-9));
    }

    #[test]
    fn test_duration_capped_by_short_clips() {
        let specs = planner().plan(&uniform_clips(3, 0.4), &["fade".to_string()], 0.5);
        assert!(specs.iter().all(|s| s.duration_secs <= 0.2 + 1e-9));
    }

    #[test]
    fn test_offsets_nonnegative_for_dense_beat_grids() {
        // An untrusted analyzer can hand back a dense but strictly
        // increasing grid, planning clips far shorter than any nominal
        // transition. Overlap must still never exceed the timeline.
        let clips = uniform_clips(8, 0.04);
        let specs = planner().plan(&clips, &["fade".to_string()], 0.5);
        for spec in &specs {
            assert!(
                spec.start_offset_secs >= 0.0,
                "pair {} has negative offset {}",
                spec.from_index,
                spec.start_offset_secs
            );
            assert!(spec.duration_secs > 0.0);
            assert!(spec.duration_secs <= 0.02 + 1e-9);
        }
    }

    #[test]
    fn test_single_clip_yields_no_transitions() {
        assert!(planner().plan(&uniform_clips(1, 1.5), &[], 0.5).is_empty());
    }

    #[test]
    fn test_empty_candidates_default_to_fade() {
        let specs = planner().plan(&uniform_clips(3, 1.5), &[], 0.5);
        assert!(specs.iter().all(|s| s.kind == "fade"));
    }
}
