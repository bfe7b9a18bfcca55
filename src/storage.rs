//! Output persistence.
//!
//! Writes the generated post and its metadata record as sibling files.
//! Existing files are overwritten silently; there is no versioning and no
//! guard against concurrent writers (last writer wins).

use crate::model::{RunMeta, RunResult};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Where one run's artifacts landed.
#[derive(Debug, Clone)]
pub struct SavedPaths {
    pub content: PathBuf,
    pub meta: PathBuf,
}

/// Write `markdown` to `dir/name` and the metadata record to
/// `dir/<stem>_meta.json`, creating `dir` (and parents) if absent.
pub fn save_outputs(markdown: &str, meta: &RunMeta, dir: &Path, name: &str) -> Result<SavedPaths> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create output directory {}", dir.display()))?;

    let content = dir.join(name);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    let meta_path = dir.join(format!("{stem}_meta.json"));

    std::fs::write(&content, markdown)
        .with_context(|| format!("write post to {}", content.display()))?;
    let meta_json = serde_json::to_string_pretty(meta).context("serialize run metadata")?;
    std::fs::write(&meta_path, meta_json)
        .with_context(|| format!("write metadata to {}", meta_path.display()))?;

    Ok(SavedPaths {
        content,
        meta: meta_path,
    })
}

/// Copy the post to a timestamped filename in the current directory, for the
/// TUI export key.
pub fn export_markdown(result: &RunResult) -> Result<PathBuf> {
    let default_name = format!(
        "crew-blog-{}-{}.md",
        result.timestamp_utc.replace(':', "-").replace('T', "_"),
        &result.run_id[..8.min(result.run_id.len())]
    );
    let path = std::env::current_dir()
        .context("get current directory")?
        .join(default_name);
    std::fs::write(&path, &result.markdown)
        .with_context(|| format!("export post to {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessMode;

    fn meta(topic: &str) -> RunMeta {
        RunMeta {
            topic: topic.to_string(),
            elapsed_sec: 1.25,
            process: ProcessMode::Sequential,
            memory: true,
            cache: true,
            max_rpm: 60,
        }
    }

    #[test]
    fn writes_post_and_sibling_meta_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("outputs");

        let paths = save_outputs("Hello world", &meta("AI vs ML"), &out, "new-blog-post.md")
            .expect("save outputs");

        assert_eq!(paths.content, out.join("new-blog-post.md"));
        assert_eq!(paths.meta, out.join("new-blog-post_meta.json"));
        let body = std::fs::read_to_string(&paths.content).expect("read post");
        assert_eq!(body, "Hello world");

        let meta_raw = std::fs::read_to_string(&paths.meta).expect("read meta");
        let parsed: serde_json::Value = serde_json::from_str(&meta_raw).expect("parse meta");
        assert_eq!(parsed["topic"], "AI vs ML");
        assert!(parsed["elapsed_sec"].as_f64().expect("elapsed_sec") >= 0.0);
        assert_eq!(parsed["process"], "sequential");
        assert_eq!(parsed["max_rpm"], 60);
    }

    #[test]
    fn overwrites_existing_files_without_warning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().to_path_buf();

        save_outputs("first", &meta("t"), &out, "post.md").expect("first save");
        let paths = save_outputs("second", &meta("t"), &out, "post.md").expect("second save");

        let body = std::fs::read_to_string(&paths.content).expect("read post");
        assert_eq!(body, "second");
    }

    #[test]
    fn meta_stem_ignores_extra_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths =
            save_outputs("x", &meta("t"), dir.path(), "weekly.post.md").expect("save outputs");
        assert!(paths.meta.ends_with("weekly.post_meta.json"));
    }
}
