//! Validated, timed execution of one pipeline kickoff.

use crate::crew::{KickoffInputs, Pipeline};
use crate::env::ResolvedEnv;
use crate::model::{RunConfig, RunFailure, RunResult};
use std::time::Instant;

/// Precondition order matters: an empty topic is reported even when the API
/// key is also missing.
pub fn check_preconditions(cfg: &RunConfig, env: &ResolvedEnv) -> Result<(), RunFailure> {
    if cfg.topic.trim().is_empty() {
        return Err(RunFailure::Validation("Please enter a topic.".into()));
    }
    if env.openai_api_key.is_none() {
        return Err(RunFailure::Configuration(
            "OPENAI_API_KEY is missing. Add it to your secrets file or .env.".into(),
        ));
    }
    Ok(())
}

/// Run the pipeline once: check preconditions, kick off with the topic as
/// sole input, measure wall-clock time. Nothing is persisted here; that
/// happens in post-processing, and only after success.
pub async fn execute_run(
    pipeline: &dyn Pipeline,
    cfg: &RunConfig,
    env: &ResolvedEnv,
) -> Result<RunResult, RunFailure> {
    check_preconditions(cfg, env)?;

    let inputs = KickoffInputs {
        topic: cfg.topic.clone(),
    };
    let started = Instant::now();
    let markdown = pipeline.kickoff(&inputs).await?;
    let elapsed_sec = started.elapsed().as_secs_f64();

    Ok(RunResult {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        run_id: cfg.run_id.clone(),
        topic: cfg.topic.clone(),
        markdown,
        elapsed_sec,
        process: cfg.process,
        memory: cfg.memory,
        cache: cfg.cache,
        max_rpm: cfg.max_rpm,
        model: env.openai_model.clone(),
        saved_path: None,
        meta_path: None,
    })
}
