use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Immutable snapshot of the user-chosen parameters for one run.
/// Rebuilt fresh from widget/CLI state on every interaction; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub topic: String,
    pub process: ProcessMode,
    pub memory: bool,
    pub cache: bool,
    pub max_rpm: u32,
    pub output_dir: PathBuf,
    pub output_name: String,
    pub show_debug: bool,
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub run_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    #[default]
    Sequential,
    Hierarchical,
}

impl ProcessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessMode::Sequential => "sequential",
            ProcessMode::Hierarchical => "hierarchical",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ProcessMode::Sequential => ProcessMode::Hierarchical,
            ProcessMode::Hierarchical => ProcessMode::Sequential,
        }
    }
}

impl std::fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl clap::ValueEnum for ProcessMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[ProcessMode::Sequential, ProcessMode::Hierarchical]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// Metadata record written next to the generated post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub topic: String,
    pub elapsed_sec: f64,
    pub process: ProcessMode,
    pub memory: bool,
    pub cache: bool,
    pub max_rpm: u32,
}

/// Outcome of one successful crew run. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(default)]
    pub timestamp_utc: String,
    pub run_id: String,
    pub topic: String,
    pub markdown: String,
    pub elapsed_sec: f64,
    pub process: ProcessMode,
    pub memory: bool,
    pub cache: bool,
    pub max_rpm: u32,
    pub model: String,
    #[serde(default)]
    pub saved_path: Option<PathBuf>,
    #[serde(default)]
    pub meta_path: Option<PathBuf>,
}

impl RunResult {
    pub fn meta(&self) -> RunMeta {
        RunMeta {
            topic: self.topic.clone(),
            elapsed_sec: self.elapsed_sec,
            process: self.process,
            memory: self.memory,
            cache: self.cache,
            max_rpm: self.max_rpm,
        }
    }
}

/// The three user-visible failure kinds. All are scoped to the current
/// interaction: the run halts, nothing is persisted, the process lives on.
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Pipeline(#[from] anyhow::Error),
}

impl RunFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            RunFailure::Validation(_) => FailureKind::Validation,
            RunFailure::Configuration(_) => FailureKind::Configuration,
            RunFailure::Pipeline(_) => FailureKind::Pipeline,
        }
    }

    /// Full diagnostic text shown to the user, chain included.
    pub fn detail(&self) -> String {
        match self {
            RunFailure::Pipeline(e) => format!("{e:#}"),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Validation,
    Configuration,
    Pipeline,
}

/// Events emitted by the run controller and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum RunEvent {
    RunStarted { topic: String },
    Status(String),
    RunCompleted { result: Box<RunResult> },
    RunFailed { kind: FailureKind, detail: String },
}
