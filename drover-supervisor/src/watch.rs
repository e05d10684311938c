//! Preference-file watcher: the change-notification feed.
//!
//! Watches the directory holding the YAML preference file, debounces the
//! burst of filesystem events a single save produces, reloads the store,
//! and dispatches each changed key through the control queue. Embedders
//! with their own preference plumbing can skip this and call
//! [`Supervisor::preference_changed`] directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use drover_core::YamlPreferences;

use crate::control::Supervisor;
use crate::error::SupervisorError;

/// Window inside which repeated events for the same path collapse.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

impl Supervisor {
    /// Watch the file backing `prefs` and route every changed key. The
    /// task ends on supervisor teardown.
    pub fn watch_preferences(
        &self,
        prefs: Arc<YamlPreferences>,
    ) -> JoinHandle<Result<(), SupervisorError>> {
        let supervisor = self.clone();
        let shutdown = self.shutdown_subscribe();
        tokio::spawn(watch_task(prefs, supervisor, shutdown))
    }
}

async fn watch_task(
    prefs: Arc<YamlPreferences>,
    supervisor: Supervisor,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SupervisorError> {
    let path = prefs.path().to_path_buf();
    // Watch the parent directory: editors and stores typically replace the
    // file via rename, which would silently detach a file-level watch.
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut _watcher: RecommendedWatcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    _watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::debug!(path = %path.display(), "watching preference file");

    let mut debounce = HashMap::<PathBuf, Instant>::new();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                if !event.paths.iter().any(|p| concerns(p, &path)) {
                    continue;
                }
                if !should_process_event(&mut debounce, &path, Instant::now()) {
                    continue;
                }

                match prefs.reload() {
                    Ok(changed) => {
                        for key in changed {
                            if let Err(err) = supervisor.preference_changed(&key).await {
                                tracing::error!(key, error = %err, "preference change handling failed");
                            }
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "preference reload failed"),
                }
            }
        }
    }

    Ok(())
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Whether an event path refers to the watched preference file. Rename
/// chains can report the final path or just the file name within the
/// watched directory.
fn concerns(event_path: &Path, prefs_path: &Path) -> bool {
    event_path == prefs_path || event_path.file_name() == prefs_path.file_name()
}

fn should_process_event(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
) -> bool {
    should_process_event_with_threshold(debounce, path, now, DEBOUNCE_WINDOW)
}

fn should_process_event_with_threshold(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= Duration::from_secs(30));
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
