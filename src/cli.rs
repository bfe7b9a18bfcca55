use crate::crew::{CrewCache, CrewKey, CrewSettings};
use crate::env::{self, ResolvedEnv};
use crate::model::{ProcessMode, RunConfig, RunFailure, RunResult};
use crate::orchestrator;
use anyhow::Result;
use clap::Parser;
use rand::RngCore;
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "crew-blog-cli",
    version,
    about = "Run a two-agent research/write crew on a topic, with optional TUI"
)]
pub struct Cli {
    /// Topic to research and write about
    #[arg(long, default_value = "AI vs ML vs DL vs Data Science")]
    pub topic: String,

    /// Crew process mode
    #[arg(long, value_enum, default_value_t = ProcessMode::Sequential)]
    pub process: ProcessMode,

    /// Enable crew memory across runs
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub memory: bool,

    /// Enable the crew result cache
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub cache: bool,

    /// Max chat requests per minute
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(10..=200))]
    pub max_rpm: u32,

    /// Output directory for the post and its metadata
    #[arg(long, default_value = "outputs")]
    pub output_dir: std::path::PathBuf,

    /// Output filename (.md)
    #[arg(long, default_value = "new-blog-post.md")]
    pub output_name: String,

    /// Show the research debug note in the TUI
    #[arg(long)]
    pub show_debug: bool,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = "https://api.openai.com/v1")]
    pub base_url: String,

    /// Per-request timeout for chat completions
    #[arg(long, default_value = "90s")]
    pub request_timeout: humantime::Duration,

    /// Path to the secrets file (default: <config dir>/crew-blog-cli/secrets.toml)
    #[arg(long)]
    pub secrets_file: Option<std::path::PathBuf>,

    /// Print JSON result and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for cron usage)
    #[arg(long)]
    pub silent: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }

    if args.silent {
        return run_headless(args, true).await;
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_headless(args, false).await;
        }
    }

    run_headless(args, false).await
}

/// Generate a random run ID.
pub(crate) fn gen_run_id() -> String {
    let mut b = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut b);
    u64::from_le_bytes(b).to_string()
}

/// Build a `RunConfig` snapshot from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        topic: args.topic.clone(),
        process: args.process,
        memory: args.memory,
        cache: args.cache,
        max_rpm: args.max_rpm,
        output_dir: args.output_dir.clone(),
        output_name: args.output_name.clone(),
        show_debug: args.show_debug,
        base_url: args.base_url.clone(),
        request_timeout: Duration::from(args.request_timeout),
        run_id: gen_run_id(),
    }
}

/// One validated, blocking crew run: resolve env, build the memoized crew,
/// kick off, persist. Shared by the JSON, text, and silent modes.
async fn run_once(cfg: &RunConfig, env: &ResolvedEnv) -> Result<RunResult, RunFailure> {
    orchestrator::check_preconditions(cfg, env)?;
    let mut cache = CrewCache::new(CrewSettings {
        base_url: cfg.base_url.clone(),
        request_timeout: cfg.request_timeout,
        env: env.clone(),
    });
    let crew = cache.get_or_build(CrewKey::from(cfg))?;
    orchestrator::execute_run(crew.as_ref(), cfg, env).await
}

/// One line of headless output and the stream it belongs on. Results go to
/// stdout, progress and save messages to stderr, so `--json` stays pipeable.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Headless output runs through one blocking task so async code never waits
/// on console writes.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            let (target, msg): (&mut dyn Write, String) = match line {
                OutputLine::Stdout(msg) => (&mut out, msg),
                OutputLine::Stderr(msg) => (&mut err, msg),
            };
            let _ = writeln!(target, "{msg}");
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

/// Headless execution shared by `--json`, `--text`, and `--silent`.
async fn run_headless(args: Cli, silent: bool) -> Result<()> {
    let env = env::resolve(args.secrets_file.as_deref());
    let cfg = build_config(&args);

    let (out_tx, out_handle) = if silent {
        (None, None)
    } else {
        let (tx, handle) = spawn_output_writer();
        (Some(tx), Some(handle))
    };

    if let Some(tx) = out_tx.as_ref() {
        let _ = tx.send(OutputLine::Stderr(format!(
            "Running crew on \"{}\" ({}, model {})…",
            cfg.topic, cfg.process, env.openai_model
        )));
    }

    let result = match run_once(&cfg, &env).await {
        Ok(r) => r,
        // Nothing was persisted; surface the failure and stop.
        Err(failure) => {
            finish_writer(out_tx, out_handle).await;
            return Err(anyhow::Error::new(failure));
        }
    };

    let processed = orchestrator::process_run_completion(&cfg, result);
    if let Some(tx) = out_tx.as_ref() {
        for msg in &processed.messages {
            let _ = tx.send(OutputLine::Stderr(msg.clone()));
        }
    }

    if args.json {
        if let Some(tx) = out_tx.as_ref() {
            let out = serde_json::to_string_pretty(&processed.result)?;
            let _ = tx.send(OutputLine::Stdout(out));
        }
    } else if let Some(tx) = out_tx.as_ref() {
        let summary = crate::text_summary::build_text_summary(&processed.result);
        for line in summary.lines {
            let _ = tx.send(OutputLine::Stdout(line));
        }
    }

    finish_writer(out_tx, out_handle).await;
    Ok(())
}

async fn finish_writer(
    out_tx: Option<mpsc::UnboundedSender<OutputLine>>,
    out_handle: Option<tokio::task::JoinHandle<()>>,
) {
    if let Some(tx) = out_tx {
        drop(tx);
    }
    if let Some(handle) = out_handle {
        let _ = handle.await;
    }
}
