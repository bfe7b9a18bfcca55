//! Run lifecycle controller.
//!
//! Owns start/cancel orchestration for the TUI and emits events for the
//! presentation layer. One run at a time: the crew blocks no UI thread
//! because kickoff happens on a spawned task, and a cancel aborts that task.

use crate::crew::{CrewCache, CrewKey, CrewSettings};
use crate::model::{FailureKind, RunConfig, RunEvent, RunFailure, RunResult};
use super::post_process::process_run_completion;
use super::run::{check_preconditions, execute_run};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers to control runs.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Run(Box<RunConfig>),
    Cancel,
    Quit,
}

/// Handle for an in-flight run task.
struct RunCtx {
    cfg: RunConfig,
    handle: Option<tokio::task::JoinHandle<Result<RunResult, RunFailure>>>,
    cancelled: bool,
}

/// Orchestrate runs based on UI commands and emit events back.
pub(crate) async fn run_controller(
    settings: CrewSettings,
    event_tx: UnboundedSender<RunEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut cache = CrewCache::new(settings);
    let mut run_ctx: Option<RunCtx> = None;
    let mut quit_pending = false;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Run(cfg)) => {
                        if run_ctx.is_some() {
                            let _ = event_tx.send(RunEvent::Status(
                                "A run is already in progress.".into(),
                            ));
                            continue;
                        }
                        match start_run(&mut cache, *cfg, &event_tx) {
                            Ok(ctx) => run_ctx = Some(ctx),
                            Err(failure) => {
                                let _ = event_tx.send(RunEvent::RunFailed {
                                    kind: failure.kind(),
                                    detail: failure.detail(),
                                });
                            }
                        }
                    }
                    Some(UiCommand::Cancel) => {
                        if let Some(ctx) = &mut run_ctx {
                            ctx.cancelled = true;
                            if let Some(h) = ctx.handle.as_ref() {
                                h.abort();
                            }
                            let _ = event_tx.send(RunEvent::Status("Cancelling…".into()));
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        if let Some(ctx) = &mut run_ctx {
                            ctx.cancelled = true;
                            if let Some(h) = ctx.handle.as_ref() {
                                h.abort();
                            }
                            quit_pending = true;
                        } else {
                            break;
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it
            // can be dropped if another branch is chosen and completion is
            // never observed.
            maybe_done = async {
                if let Some(ctx) = &mut run_ctx {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    let ctx = run_ctx.take().expect("completed run must have a context");
                    match join_res {
                        Ok(Ok(result)) => {
                            let processed = process_run_completion(&ctx.cfg, result);
                            for msg in processed.messages {
                                let _ = event_tx.send(RunEvent::Status(msg));
                            }
                            let _ = event_tx.send(RunEvent::RunCompleted {
                                result: Box::new(processed.result),
                            });
                        }
                        Ok(Err(failure)) => {
                            let _ = event_tx.send(RunEvent::RunFailed {
                                kind: failure.kind(),
                                detail: failure.detail(),
                            });
                        }
                        Err(join_err) if join_err.is_cancelled() && ctx.cancelled => {
                            let _ = event_tx.send(RunEvent::Status("Run cancelled.".into()));
                        }
                        Err(join_err) => {
                            let _ = event_tx.send(RunEvent::RunFailed {
                                kind: FailureKind::Pipeline,
                                detail: format!("run task failed: {join_err}"),
                            });
                        }
                    }
                    if quit_pending {
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Validate preconditions, fetch the memoized crew, and spawn the run task.
fn start_run(
    cache: &mut CrewCache,
    cfg: RunConfig,
    event_tx: &UnboundedSender<RunEvent>,
) -> Result<RunCtx, RunFailure> {
    let env = cache.settings().env.clone();
    check_preconditions(&cfg, &env)?;
    let crew = cache.get_or_build(CrewKey::from(&cfg))?;

    let _ = event_tx.send(RunEvent::RunStarted {
        topic: cfg.topic.clone(),
    });
    let _ = event_tx.send(RunEvent::Status(
        "Running crew… this can take a minute depending on transcripts and model speed.".into(),
    ));

    let task_cfg = cfg.clone();
    let handle = tokio::spawn(async move { execute_run(crew.as_ref(), &task_cfg, &env).await });

    Ok(RunCtx {
        cfg,
        handle: Some(handle),
        cancelled: false,
    })
}
