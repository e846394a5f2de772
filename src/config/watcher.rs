//! Configuration file watcher for hot reload.
//!
//! Editors usually emit several events per save (truncate + write, or a
//! rename followed by a create). The file is re-read only once it has been
//! quiet for the settle window, so a half-written file is never loaded.
//! Metadata-only changes are ignored.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::resolve_config;
use crate::config::schema::ProxyConfig;

const SETTLE_WINDOW: Duration = Duration::from_millis(500);

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to be delivered.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let settle = Settle::default();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !changes_content(&event.kind) {
                        return;
                    }
                    let ticket = settle.mark();
                    let settle = settle.clone();
                    let tx = tx.clone();
                    let path = path.clone();
                    std::thread::spawn(move || {
                        std::thread::sleep(SETTLE_WINDOW);
                        if !settle.is_latest(ticket) {
                            return;
                        }

                        tracing::info!(path = ?path, "Config file change detected, reloading");
                        // Environment overrides still win over the file on reload.
                        match resolve_config(Some(&path)) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                            }
                        }
                    });
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Whether an event can have changed what the file contains.
fn changes_content(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Tracks the most recent event; only the last one of a burst reloads.
#[derive(Debug, Clone, Default)]
struct Settle {
    latest: Arc<AtomicU64>,
}

impl Settle {
    fn mark(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn only_content_changes_trigger_reload() {
        assert!(changes_content(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(changes_content(&EventKind::Create(CreateKind::File)));
        assert!(!changes_content(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
        assert!(!changes_content(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn burst_of_events_reloads_once() {
        let settle = Settle::default();
        let truncate = settle.mark();
        let write = settle.clone().mark();

        assert!(!settle.is_latest(truncate));
        assert!(settle.is_latest(write));
    }
}
