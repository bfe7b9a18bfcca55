use crate::model::RunResult;
use crate::storage::{self, SavedPaths};
use anyhow::Result;
use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Re-save the post to the currently configured output location.
pub(super) fn save_result(result: &RunResult, dir: &Path, name: &str) -> Result<SavedPaths> {
    storage::save_outputs(&result.markdown, &result.meta(), dir, name)
}

/// Save and produce the status message shown to the user.
pub(super) fn save_message(result: &RunResult, dir: &Path, name: &str) -> String {
    match save_result(result, dir, name) {
        Ok(paths) => format!("Saved: {}", paths.content.display()),
        Err(e) => format!("Save failed: {e:#}"),
    }
}

/// Export a timestamped copy of the post to the current directory.
/// Returns the absolute path of the exported file.
pub(super) fn export_result_markdown(result: &RunResult) -> Result<std::path::PathBuf> {
    storage::export_markdown(result)
}

/// Initialize the clipboard manager thread if not already initialized.
/// A dedicated thread processes clipboard operations sequentially and keeps
/// each clipboard instance alive long enough for clipboard managers to read
/// the contents (needed on Linux).
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Copy text to clipboard. Returns immediately after queuing the operation.
pub(super) fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}
