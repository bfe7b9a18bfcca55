//! Application-level orchestration.
//!
//! This module owns run execution (precondition checks, the timed kickoff),
//! run lifecycle control for the TUI (start/cancel), and post-run persistence.
//! UI/CLI layers call into this module to keep responsibilities separated.

#[cfg(feature = "tui")]
mod controller;
mod post_process;
mod run;

#[cfg(feature = "tui")]
pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use post_process::process_run_completion;
pub(crate) use run::{check_preconditions, execute_run};
