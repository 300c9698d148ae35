//! End-to-end pipeline runs against fake collaborators and a scripted
//! external tool. No real ffmpeg/ffprobe is spawned.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use beatcut_common::{AppConfig, BeatcutError, BeatcutResult};
use beatcut_media_model::AudioAnalysis;
use beatcut_pipeline::{
    AssetStore, AudioAnalyzer, JobRequest, LocalAssetStore, PipelineOrchestrator, ProgressSink,
};
use beatcut_render_engine::{EncoderCaps, ProcessRunner, RunOutput};
use tempfile::TempDir;

/// Scripted stand-in for ffmpeg/ffprobe. Classifies each invocation by its
/// argument shape and either writes the expected output file or fails.
struct FakeTool {
    fail_clip_indices: HashSet<usize>,
    fail_filter_complex: bool,
    fail_trim: bool,
    probed_duration: f64,
    invocations: Mutex<Vec<Vec<String>>>,
}

impl FakeTool {
    fn new() -> Self {
        Self {
            fail_clip_indices: HashSet::new(),
            fail_filter_complex: false,
            fail_trim: false,
            probed_duration: 10.0,
            invocations: Mutex::new(vec![]),
        }
    }

    fn count_matching(&self, needle: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|args| args.iter().any(|a| a.contains(needle)))
            .count()
    }

    /// Invocations whose output artifact is a clip segment.
    fn count_clip_renders(&self) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|args| args.last().is_some_and(|out| clip_index(out).is_some()))
            .count()
    }
}

#[async_trait]
impl ProcessRunner for FakeTool {
    async fn run(&self, program: &str, args: &[String]) -> BeatcutResult<RunOutput> {
        self.invocations.lock().unwrap().push(args.to_vec());

        if program == "ffprobe" {
            return Ok(RunOutput {
                status: 0,
                stdout: format!("{:.6}\n", self.probed_duration),
                stderr: String::new(),
            });
        }

        let output = args.last().cloned().unwrap_or_default();

        if let Some(index) = clip_index(&output) {
            if self.fail_clip_indices.contains(&index) {
                return Ok(RunOutput {
                    status: 1,
                    stdout: String::new(),
                    stderr: "scripted clip failure".to_string(),
                });
            }
        } else if args.iter().any(|a| a == "-filter_complex") && self.fail_filter_complex {
            return Ok(RunOutput {
                status: 1,
                stdout: String::new(),
                stderr: "scripted filter failure".to_string(),
            });
        } else if output.ends_with("trimmed.mp4") && self.fail_trim {
            return Ok(RunOutput {
                status: 1,
                stdout: String::new(),
                stderr: "scripted trim failure".to_string(),
            });
        }

        tokio::fs::write(&output, b"video").await?;
        Ok(RunOutput {
            status: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn clip_index(path: &str) -> Option<usize> {
    let name = Path::new(path).file_name()?.to_str()?;
    let digits = name.strip_prefix("clip_")?.strip_suffix(".mp4")?;
    digits.parse().ok()
}

/// 120 BPM, beats every 0.5 seconds for 30 seconds.
struct SteadyAnalyzer;

#[async_trait]
impl AudioAnalyzer for SteadyAnalyzer {
    async fn analyze(&self, _path: &Path) -> BeatcutResult<AudioAnalysis> {
        Ok(AudioAnalysis {
            bpm: 120.0,
            beat_times: (0..=60).map(|i| i as f64 * 0.5).collect(),
            duration_secs: 30.0,
        })
    }
}

struct BrokenAnalyzer;

#[async_trait]
impl AudioAnalyzer for BrokenAnalyzer {
    async fn analyze(&self, _path: &Path) -> BeatcutResult<AudioAnalysis> {
        Err(BeatcutError::analysis("decoder crashed"))
    }
}

struct RecordingSink {
    updates: Mutex<Vec<u8>>,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, _job_id: &str, percent: u8, _label: &str) {
        self.updates.lock().unwrap().push(percent);
    }
}

struct Fixture {
    dir: TempDir,
    config: AppConfig,
    image_urls: Vec<String>,
    audio_url: String,
}

impl Fixture {
    fn new(image_count: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();

        let mut image_urls = Vec::new();
        for i in 0..image_count {
            let path = dir.path().join(format!("src_{i}.jpg"));
            std::fs::write(&path, b"jpeg").unwrap();
            image_urls.push(path.display().to_string());
        }
        let audio = dir.path().join("track.mp3");
        std::fs::write(&audio, b"mp3").unwrap();

        let mut config = AppConfig::default();
        config.pipeline.work_root = dir.path().join("jobs");

        Self {
            dir,
            config,
            image_urls,
            audio_url: audio.display().to_string(),
        }
    }

    fn store(&self) -> Arc<LocalAssetStore> {
        Arc::new(LocalAssetStore::new(self.dir.path().join("published")))
    }

    fn request(&self, target_secs: f64) -> JobRequest {
        JobRequest {
            job_id: "job-1".to_string(),
            image_urls: self.image_urls.clone(),
            audio_url: self.audio_url.clone(),
            target_secs,
            transition_candidates: vec!["fade".to_string(), "wipeleft".to_string()],
            motion_candidates: vec![],
            caption: None,
            output_key: "out/video.mp4".to_string(),
        }
    }
}

fn orchestrator(
    fixture: &Fixture,
    runner: Arc<FakeTool>,
    analyzer: Arc<dyn AudioAnalyzer>,
    sink: Arc<dyn ProgressSink>,
) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        fixture.config.clone(),
        fixture.store(),
        analyzer,
        runner,
        EncoderCaps::fixed(None, false),
        sink,
    )
    .unwrap()
}

#[tokio::test]
async fn test_happy_path_beat_synced_render() {
    let fixture = Fixture::new(10);
    let runner = Arc::new(FakeTool::new());
    let sink = Arc::new(RecordingSink {
        updates: Mutex::new(vec![]),
    });

    let orchestrator = orchestrator(
        &fixture,
        runner.clone(),
        Arc::new(SteadyAnalyzer),
        sink.clone(),
    );
    let outcome = orchestrator.run_job(fixture.request(20.0)).await.unwrap();

    assert!(Path::new(&outcome.artifact).exists());

    // 0.5s beat interval with bounds [1.0, 1.5] picks 3 beats per clip:
    // 1.5s estimated clips, 14 of them to fill 20 seconds.
    assert_eq!(runner.count_clip_renders(), 14);

    // Progress reaches completion and never moves backwards.
    let updates = sink.updates.lock().unwrap();
    assert_eq!(*updates.last().unwrap(), 100);
    assert!(updates.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_unusable_analysis_falls_back_to_uniform_clips() {
    let fixture = Fixture::new(5);
    let runner = Arc::new(FakeTool::new());

    let orchestrator = orchestrator(
        &fixture,
        runner.clone(),
        Arc::new(BrokenAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );
    let outcome = orchestrator.run_job(fixture.request(6.0)).await.unwrap();

    assert!(Path::new(&outcome.artifact).exists());
    // floor(6.0 / 0.6) uniform fallback clips.
    assert_eq!(runner.count_clip_renders(), 10);
}

#[tokio::test]
async fn test_partial_image_failures_degrade_by_duplication() {
    let mut fixture = Fixture::new(4);
    fixture.image_urls.push("/nonexistent/a.jpg".to_string());
    fixture.image_urls.push("/nonexistent/b.jpg".to_string());

    let runner = Arc::new(FakeTool::new());
    let orchestrator = orchestrator(
        &fixture,
        runner.clone(),
        Arc::new(SteadyAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    let outcome = orchestrator.run_job(fixture.request(10.0)).await.unwrap();
    assert!(Path::new(&outcome.artifact).exists());
}

#[tokio::test]
async fn test_too_few_images_is_fatal() {
    let mut fixture = Fixture::new(1);
    fixture.image_urls.push("/nonexistent/a.jpg".to_string());
    fixture.image_urls.push("/nonexistent/b.jpg".to_string());

    let runner = Arc::new(FakeTool::new());
    let orchestrator = orchestrator(
        &fixture,
        runner,
        Arc::new(SteadyAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    let err = orchestrator.run_job(fixture.request(10.0)).await.unwrap_err();
    assert!(matches!(err, BeatcutError::Acquisition { .. }));
}

#[tokio::test]
async fn test_clip_failures_rebuild_plan_and_succeed() {
    let fixture = Fixture::new(8);
    let mut tool = FakeTool::new();
    tool.fail_clip_indices = HashSet::from([1, 4]);
    let runner = Arc::new(tool);

    let orchestrator = orchestrator(
        &fixture,
        runner.clone(),
        Arc::new(SteadyAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    let outcome = orchestrator.run_job(fixture.request(20.0)).await.unwrap();
    assert!(Path::new(&outcome.artifact).exists());
}

#[tokio::test]
async fn test_fewer_than_two_clips_is_fatal() {
    let fixture = Fixture::new(5);
    let mut tool = FakeTool::new();
    // 6s target at 0.6s fallback clips plans 10 clips; fail all but one.
    tool.fail_clip_indices = (1..10).collect();
    let runner = Arc::new(tool);

    let orchestrator = orchestrator(
        &fixture,
        runner,
        Arc::new(BrokenAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    let err = orchestrator.run_job(fixture.request(6.0)).await.unwrap_err();
    assert!(matches!(err, BeatcutError::ClipGeneration { .. }));
}

#[tokio::test]
async fn test_compose_falls_back_to_concat() {
    let fixture = Fixture::new(6);
    let mut tool = FakeTool::new();
    tool.fail_filter_complex = true;
    let runner = Arc::new(tool);

    let orchestrator = orchestrator(
        &fixture,
        runner.clone(),
        Arc::new(SteadyAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    let outcome = orchestrator.run_job(fixture.request(10.0)).await.unwrap();
    assert!(Path::new(&outcome.artifact).exists());
    // The crossfade attempt failed and the concat demuxer finished the job.
    assert!(runner.count_matching("concat") >= 1);
}

#[tokio::test]
async fn test_upload_failure_is_fatal() {
    struct FailingUploadStore {
        inner: LocalAssetStore,
    }

    #[async_trait]
    impl AssetStore for FailingUploadStore {
        async fn download(
            &self,
            url: &str,
            dest_dir: &Path,
        ) -> BeatcutResult<std::path::PathBuf> {
            self.inner.download(url, dest_dir).await
        }

        async fn upload(&self, _path: &Path, _key: &str) -> BeatcutResult<String> {
            Err(BeatcutError::upload("bucket unreachable"))
        }
    }

    let fixture = Fixture::new(5);
    let runner = Arc::new(FakeTool::new());
    let orchestrator = PipelineOrchestrator::new(
        fixture.config.clone(),
        Arc::new(FailingUploadStore {
            inner: LocalAssetStore::new(fixture.dir.path().join("published")),
        }),
        Arc::new(SteadyAnalyzer),
        runner,
        EncoderCaps::fixed(None, false),
        Arc::new(beatcut_pipeline::NullProgressSink),
    )
    .unwrap();

    let err = orchestrator.run_job(fixture.request(10.0)).await.unwrap_err();
    assert!(matches!(err, BeatcutError::Upload { .. }));
}

#[tokio::test]
async fn test_caption_overlay_and_audio_mix_run() {
    let fixture = Fixture::new(5);
    let runner = Arc::new(FakeTool::new());

    let orchestrator = orchestrator(
        &fixture,
        runner.clone(),
        Arc::new(SteadyAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    let mut request = fixture.request(10.0);
    request.caption = Some("Summer '24".to_string());
    let outcome = orchestrator.run_job(request).await.unwrap();

    assert!(Path::new(&outcome.artifact).exists());
    assert_eq!(runner.count_matching("drawtext"), 1);
    assert_eq!(runner.count_matching("-shortest"), 1);
}

#[tokio::test]
async fn test_overlong_output_is_trimmed_to_target() {
    let fixture = Fixture::new(5);
    let mut tool = FakeTool::new();
    tool.probed_duration = 10.8;
    let runner = Arc::new(tool);

    let orchestrator = orchestrator(
        &fixture,
        runner.clone(),
        Arc::new(SteadyAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    let outcome = orchestrator.run_job(fixture.request(10.0)).await.unwrap();
    assert!(Path::new(&outcome.artifact).exists());

    // 10.8s measured against a 10.0s target exceeds the 0.5s tolerance,
    // so a stream-copy trim to the target runs.
    let invocations = runner.invocations.lock().unwrap();
    let trim = invocations
        .iter()
        .find(|args| args.last().is_some_and(|out| out.ends_with("trimmed.mp4")))
        .expect("trim invocation");
    let t_pos = trim.iter().position(|a| a == "-t").expect("-t flag");
    assert_eq!(trim[t_pos + 1], "10.000");
}

#[tokio::test]
async fn test_trim_failure_ships_untrimmed_output() {
    let fixture = Fixture::new(5);
    let mut tool = FakeTool::new();
    tool.probed_duration = 10.8;
    tool.fail_trim = true;
    let runner = Arc::new(tool);

    let orchestrator = orchestrator(
        &fixture,
        runner.clone(),
        Arc::new(SteadyAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    // The trim was attempted and failed; the job still succeeds with the
    // untrimmed output.
    let outcome = orchestrator.run_job(fixture.request(10.0)).await.unwrap();
    assert!(Path::new(&outcome.artifact).exists());
    assert_eq!(runner.count_matching("trimmed.mp4"), 1);
}

#[tokio::test]
async fn test_work_dir_removed_after_job() {
    let fixture = Fixture::new(5);
    let runner = Arc::new(FakeTool::new());

    let orchestrator = orchestrator(
        &fixture,
        runner,
        Arc::new(SteadyAnalyzer),
        Arc::new(beatcut_pipeline::NullProgressSink),
    );

    orchestrator.run_job(fixture.request(10.0)).await.unwrap();
    assert!(!fixture.config.pipeline.work_root.join("job-1").exists());
}
