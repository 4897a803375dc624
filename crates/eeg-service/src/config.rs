//! Service configuration surface
//!
//! Flags with environment-variable fallbacks; the same knobs the original
//! deployment exposed, plus the preprocessing toggles.

use clap::Parser;
use eeg_processing::PreprocessConfig;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "eeg-service", about = "EEG analysis request processing service")]
pub struct ServiceConfig {
    /// Staging directory for materialized recording payloads
    #[arg(long, env = "EEG_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Watched directory for request marker files (default: <data-dir>/requests)
    #[arg(long, env = "EEG_WATCH_DIR")]
    pub watch_dir: Option<PathBuf>,

    /// Request store directory
    #[arg(long, env = "EEG_STORE_DIR", default_value = "./store")]
    pub store_dir: PathBuf,

    /// Store poll interval in seconds
    #[arg(long, env = "EEG_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Marker directory scan interval in seconds
    #[arg(long, env = "EEG_WATCH_INTERVAL_SECS", default_value_t = 1)]
    pub watch_interval_secs: u64,

    /// Disable notch/bandpass filtering
    #[arg(long, env = "EEG_NO_FILTER")]
    pub no_filter: bool,

    /// Disable average re-referencing
    #[arg(long, env = "EEG_NO_REREFERENCE")]
    pub no_rereference: bool,

    /// Disable amplitude artifact rejection
    #[arg(long, env = "EEG_NO_ARTIFACT_REJECTION")]
    pub no_artifact_rejection: bool,

    /// Line-noise frequency in Hz
    #[arg(long, env = "EEG_LINE_FREQ", default_value_t = 50.0)]
    pub line_freq: f32,

    /// Resample recordings to this rate before analysis
    #[arg(long, env = "EEG_RESAMPLE_TO")]
    pub resample_to: Option<f32>,

    /// Path to the trained model artifact; stub predictions without one
    #[arg(long, env = "EEG_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Concurrent pipeline workers (default: available cores)
    #[arg(long, env = "EEG_WORKERS")]
    pub workers: Option<usize>,

    /// Claim lease TTL in seconds; a crashed worker's claim expires after
    /// this long
    #[arg(long, env = "EEG_LEASE_TTL_SECS", default_value_t = 600)]
    pub lease_ttl_secs: i64,
}

impl ServiceConfig {
    pub fn watch_dir(&self) -> PathBuf {
        self.watch_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("requests"))
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().max(1))
    }

    pub fn preprocess_config(&self) -> PreprocessConfig {
        PreprocessConfig {
            filter_enabled: !self.no_filter,
            line_freq: self.line_freq,
            rereference_enabled: !self.no_rereference,
            artifact_rejection_enabled: !self.no_artifact_rejection,
            resample_to: self.resample_to,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::parse_from(["eeg-service"]);

        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.watch_dir(), PathBuf::from("./data/requests"));
        assert!(config.worker_count() >= 1);

        let preprocess = config.preprocess_config();
        assert!(preprocess.filter_enabled);
        assert!(preprocess.rereference_enabled);
        assert!(preprocess.artifact_rejection_enabled);
        assert_eq!(preprocess.line_freq, 50.0);
        assert!(preprocess.resample_to.is_none());
    }

    #[test]
    fn test_toggles_map_to_pipeline_config() {
        let config = ServiceConfig::parse_from([
            "eeg-service",
            "--no-filter",
            "--no-artifact-rejection",
            "--resample-to",
            "128",
            "--line-freq",
            "60",
        ]);

        let preprocess = config.preprocess_config();
        assert!(!preprocess.filter_enabled);
        assert!(preprocess.rereference_enabled);
        assert!(!preprocess.artifact_rejection_enabled);
        assert_eq!(preprocess.resample_to, Some(128.0));
        assert_eq!(preprocess.line_freq, 60.0);
    }

    #[test]
    fn test_explicit_watch_dir_wins() {
        let config =
            ServiceConfig::parse_from(["eeg-service", "--watch-dir", "/tmp/markers"]);
        assert_eq!(config.watch_dir(), PathBuf::from("/tmp/markers"));
    }
}
