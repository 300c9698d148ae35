//! Audio analysis collaborator: trait seam, deadline, and a bounded cache.
//!
//! The analyzer is external and untrusted. A slow or failing analysis never
//! fails a job: past the deadline the orchestrator substitutes a neutral
//! default and planning falls back to uniform clip durations.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use beatcut_common::BeatcutResult;
use beatcut_media_model::AudioAnalysis;

/// Produces beat and tempo data for an audio file.
#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    async fn analyze(&self, path: &Path) -> BeatcutResult<AudioAnalysis>;
}

/// Run the analyzer under a deadline, substituting a neutral default on
/// timeout or failure. `fallback_duration_secs` sizes the default so the
/// planner still has a target to fill.
pub async fn analyze_with_deadline(
    analyzer: &dyn AudioAnalyzer,
    path: &Path,
    deadline: Duration,
    fallback_duration_secs: f64,
) -> AudioAnalysis {
    match tokio::time::timeout(deadline, analyzer.analyze(path)).await {
        Ok(Ok(analysis)) => analysis,
        Ok(Err(e)) => {
            tracing::warn!(path = %path.display(), error = %e, "Audio analysis failed, using default");
            AudioAnalysis::unavailable(fallback_duration_secs)
        }
        Err(_) => {
            tracing::warn!(
                path = %path.display(),
                timeout_secs = deadline.as_secs(),
                "Audio analysis timed out, using default"
            );
            AudioAnalysis::unavailable(fallback_duration_secs)
        }
    }
}

/// Bounded analysis cache keyed by source identity (the asset URL, not the
/// per-job local path). Inserting past capacity evicts the oldest entry.
pub struct AnalysisCache {
    capacity: usize,
    entries: HashMap<String, AudioAnalysis>,
    order: VecDeque<String>,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AudioAnalysis> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, analysis: AudioAnalysis) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, analysis);
            return;
        }
        while self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, analysis);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatcut_common::BeatcutError;
    use std::path::PathBuf;

    struct SlowAnalyzer;

    #[async_trait]
    impl AudioAnalyzer for SlowAnalyzer {
        async fn analyze(&self, _path: &Path) -> BeatcutResult<AudioAnalysis> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("deadline fires first")
        }
    }

    struct FailingAnalyzer;

    #[async_trait]
    impl AudioAnalyzer for FailingAnalyzer {
        async fn analyze(&self, _path: &Path) -> BeatcutResult<AudioAnalysis> {
            Err(BeatcutError::analysis("decoder crashed"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_substitutes_default() {
        let analysis = analyze_with_deadline(
            &SlowAnalyzer,
            &PathBuf::from("track.mp3"),
            Duration::from_secs(1),
            20.0,
        )
        .await;
        assert!(!analysis.is_usable());
        assert!((analysis.duration_secs - 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failure_substitutes_default() {
        let analysis = analyze_with_deadline(
            &FailingAnalyzer,
            &PathBuf::from("track.mp3"),
            Duration::from_secs(1),
            15.0,
        )
        .await;
        assert!(!analysis.is_usable());
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = AnalysisCache::new(2);
        cache.insert("a".into(), AudioAnalysis::unavailable(1.0));
        cache.insert("b".into(), AudioAnalysis::unavailable(2.0));
        cache.insert("c".into(), AudioAnalysis::unavailable(3.0));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_cache_update_does_not_evict() {
        let mut cache = AnalysisCache::new(2);
        cache.insert("a".into(), AudioAnalysis::unavailable(1.0));
        cache.insert("b".into(), AudioAnalysis::unavailable(2.0));
        cache.insert("a".into(), AudioAnalysis::unavailable(9.0));

        assert_eq!(cache.len(), 2);
        assert!((cache.get("a").unwrap().duration_secs - 9.0).abs() < 1e-9);
        assert!(cache.get("b").is_some());
    }
}
