use std::path::PathBuf;

use crate::adaptive::config::EngineConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub file_logs: bool,
    pub log_dir: PathBuf,
    pub replay_input: Option<PathBuf>,
    pub diagnosis_interval: Option<u32>,
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let file_logs = std::env::var("ENABLE_FILE_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let log_dir = std::env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./logs"));

        let replay_input = std::env::var("REPLAY_INPUT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let diagnosis_interval = std::env::var("DIAGNOSIS_INTERVAL")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .filter(|value| *value > 0);

        Self {
            log_level,
            file_logs,
            log_dir,
            replay_input,
            diagnosis_interval,
        }
    }

    /// Engine parameters from `MATHPATH_*` variables plus the process-level
    /// diagnosis cadence.
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::from_env();
        if let Some(interval) = self.diagnosis_interval {
            engine.diagnostic.diagnosis_interval = interval;
        }
        engine
    }
}
