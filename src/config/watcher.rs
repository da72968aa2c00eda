//! Hot reload of the gateway configuration file.
//!
//! The parent directory is watched rather than the file itself: editors and
//! deploy tools usually replace the file, which drops a direct watch.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::ProxyConfig;

/// Publishes a freshly validated [`ProxyConfig`] whenever the file content changes.
pub struct ConfigWatcher {
    reloader: Reloader,
}

struct Reloader {
    path: PathBuf,
    file_name: Option<OsString>,
    last_content: Mutex<Option<String>>,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let reloader = Reloader {
            path: path.to_path_buf(),
            file_name: path.file_name().map(OsString::from),
            last_content: Mutex::new(std::fs::read_to_string(path).ok()),
            update_tx,
        };
        (Self { reloader }, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Reloads stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.reloader.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let reloader = self.reloader;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if reloader.concerns(&event) => {
                    reloader.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(dir = %dir.display(), "Config watcher started");
        Ok(watcher)
    }
}

impl Reloader {
    fn concerns(&self, event: &Event) -> bool {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return false;
        }
        event
            .paths
            .iter()
            .any(|p| p.file_name().map(OsString::from) == self.file_name)
    }

    /// Re-read the file; publish only validated configs whose text changed.
    fn reload(&self) -> bool {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Config file unreadable");
                return false;
            }
        };

        let mut last = self.last_content.lock().unwrap_or_else(|e| e.into_inner());
        if last.as_deref() == Some(content.as_str()) {
            return false;
        }

        match parse_config(&content) {
            Ok(config) => {
                *last = Some(content);
                tracing::info!(
                    routes = config.routes.len(),
                    backends = config.backends.len(),
                    "Config change detected"
                );
                self.update_tx.send(config).is_ok()
            }
            Err(e) => {
                tracing::error!(error = %e, "Config reload rejected, keeping current configuration");
                false
            }
        }
    }
}
