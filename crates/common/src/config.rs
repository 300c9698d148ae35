//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default render parameters.
    pub render: RenderDefaults,

    /// Pipeline execution parameters.
    pub pipeline: PipelineDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderDefaults {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Minimum acceptable per-clip duration (seconds).
    pub min_clip_secs: f64,

    /// Maximum acceptable per-clip duration (seconds).
    pub max_clip_secs: f64,

    /// Uniform clip duration used when beat data is unusable (seconds).
    pub fallback_clip_secs: f64,

    /// Nominal transition duration (seconds), clamped per transition kind.
    pub transition_secs: f64,

    /// Bounded worker pool width for clip generation.
    pub clip_workers: usize,

    /// Minimum number of usable source images for a job to proceed.
    pub min_viable_images: usize,

    /// Allowed overshoot before the output is trimmed to target (seconds).
    pub duration_tolerance_secs: f64,
}

/// Pipeline execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefaults {
    /// Root directory for per-job working directories.
    pub work_root: PathBuf,

    /// How many whole render jobs may execute at once.
    pub max_concurrent_jobs: usize,

    /// Timeout for the audio analysis collaborator (seconds).
    pub analysis_timeout_secs: u64,

    /// Timeout for a single external tool invocation (seconds).
    pub tool_timeout_secs: u64,

    /// Bounded capacity of the audio analysis cache (entries).
    pub analysis_cache_capacity: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "beatcut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            render: RenderDefaults::default(),
            pipeline: PipelineDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            min_clip_secs: 1.0,
            max_clip_secs: 1.5,
            fallback_clip_secs: 0.6,
            transition_secs: 0.5,
            clip_workers: 4,
            min_viable_images: 3,
            duration_tolerance_secs: 0.5,
        }
    }
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            work_root: dirs_default_work_root(),
            max_concurrent_jobs: 2,
            analysis_timeout_secs: 30,
            tool_timeout_secs: 120,
            analysis_cache_capacity: 32,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("beatcut").join("config.json")
}

/// Default root for per-job working directories.
fn dirs_default_work_root() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("beatcut").join("jobs")
}
