//! Text summary builder for CLI output.
//!
//! Formats a completed run as human-readable lines for text mode.

use crate::model::RunResult;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a completed, persisted run.
pub(crate) fn build_text_summary(result: &RunResult) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Topic: {}", result.topic));
    lines.push(format!(
        "Settings: process {} / memory {} / cache {} / max_rpm {} / model {}",
        result.process,
        on_off(result.memory),
        on_off(result.cache),
        result.max_rpm,
        result.model
    ));
    lines.push(format!("Done in {:.1}s", result.elapsed_sec));
    if let Some(p) = result.saved_path.as_deref() {
        lines.push(format!("Saved: {}", p.display()));
    }
    if let Some(p) = result.meta_path.as_deref() {
        lines.push(format!("Meta:  {}", p.display()));
    }
    lines.push(String::new());
    lines.extend(result.markdown.lines().map(|l| l.to_string()));

    TextSummary { lines }
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessMode;

    #[test]
    fn summary_reports_timing_at_one_decimal_and_the_post_body() {
        let result = RunResult {
            timestamp_utc: "2025-01-01T00:00:00Z".into(),
            run_id: "r1".into(),
            topic: "AI vs ML".into(),
            markdown: "# Title\n\nBody".into(),
            elapsed_sec: 12.34,
            process: ProcessMode::Hierarchical,
            memory: false,
            cache: true,
            max_rpm: 90,
            model: "gpt-4o-mini".into(),
            saved_path: Some("outputs/new-blog-post.md".into()),
            meta_path: Some("outputs/new-blog-post_meta.json".into()),
        };
        let summary = build_text_summary(&result);
        assert!(summary.lines.contains(&"Done in 12.3s".to_string()));
        assert!(summary
            .lines
            .iter()
            .any(|l| l.contains("process hierarchical / memory off / cache on / max_rpm 90")));
        assert!(summary.lines.contains(&"# Title".to_string()));
    }
}
