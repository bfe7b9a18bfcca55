//! Post-run processing: persistence happens here, and only after success.

use crate::model::{RunConfig, RunResult};
use crate::storage;

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub result: RunResult,
    pub messages: Vec<String>,
}

/// Persist a completed run to the configured output directory and record
/// where the artifacts landed. A save failure does not discard the result;
/// the user still gets the post plus a failure message.
pub(crate) fn process_run_completion(cfg: &RunConfig, run: RunResult) -> ProcessedRun {
    let mut result = run;
    let mut messages = Vec::new();

    match storage::save_outputs(
        &result.markdown,
        &result.meta(),
        &cfg.output_dir,
        &cfg.output_name,
    ) {
        Ok(paths) => {
            messages.push(format!("Saved: {}", paths.content.display()));
            result.saved_path = Some(paths.content);
            result.meta_path = Some(paths.meta);
        }
        Err(e) => {
            messages.push(format!("Save failed: {e:#}"));
        }
    }

    ProcessedRun { result, messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessMode;
    use std::time::Duration;

    fn result(markdown: &str) -> RunResult {
        RunResult {
            timestamp_utc: "2025-01-01T00:00:00Z".to_string(),
            run_id: "test-run".to_string(),
            topic: "AI vs ML".to_string(),
            markdown: markdown.to_string(),
            elapsed_sec: 2.5,
            process: ProcessMode::Sequential,
            memory: true,
            cache: true,
            max_rpm: 60,
            model: "gpt-4o-mini".to_string(),
            saved_path: None,
            meta_path: None,
        }
    }

    #[test]
    fn completion_persists_both_files_and_records_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = RunConfig {
            topic: "AI vs ML".to_string(),
            process: ProcessMode::Sequential,
            memory: true,
            cache: true,
            max_rpm: 60,
            output_dir: dir.path().join("outputs"),
            output_name: "new-blog-post.md".to_string(),
            show_debug: false,
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout: Duration::from_secs(90),
            run_id: "test-run".to_string(),
        };

        let processed = process_run_completion(&cfg, result("Hello world"));

        let saved = processed.result.saved_path.expect("content path recorded");
        assert!(saved.exists());
        assert!(processed.result.meta_path.expect("meta path").exists());
        assert!(processed.messages.iter().any(|m| m.starts_with("Saved:")));
    }
}
