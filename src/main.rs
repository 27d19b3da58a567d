use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use mathpath_engine::adaptive::{InMemoryLearnerStore, LearningEngine};
use mathpath_engine::config::Config;
use mathpath_engine::logging::init_tracing;
use mathpath_engine::replay;
use mathpath_engine::services::LearningService;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config);

    let Some(input) = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| config.replay_input.clone())
    else {
        tracing::error!("no replay input: pass a path or set REPLAY_INPUT");
        return ExitCode::FAILURE;
    };

    let engine = match LearningEngine::new(config.engine_config()) {
        Ok(engine) => Arc::new(engine),
        Err(err) => {
            tracing::error!(error = %err, "invalid engine configuration");
            return ExitCode::FAILURE;
        }
    };

    let records = match replay::load_records(&input).await {
        Ok(records) => records,
        Err(err) => {
            tracing::error!(error = %err, path = %input.display(), "failed to load replay input");
            return ExitCode::FAILURE;
        }
    };

    let service = LearningService::new(engine, Arc::new(InMemoryLearnerStore::new()));
    let report = match replay::run(&service, records) {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(error = %err, "replay failed");
            return ExitCode::FAILURE;
        }
    };

    for line in report.events.iter().map(serde_json::to_string) {
        match line {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(error = %err, "failed to encode event"),
        }
    }
    for summary in &report.summaries {
        match serde_json::to_string(summary) {
            Ok(line) => println!("{line}"),
            Err(err) => tracing::warn!(error = %err, "failed to encode summary"),
        }
    }

    tracing::info!(
        processed = report.processed,
        rejected = report.rejected,
        learners = report.summaries.len(),
        "replay complete"
    );
    ExitCode::SUCCESS
}
