//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself so that editors
//! which save by renaming a temp file over the original still trigger a reload.
//! A burst of events for one save publishes at most one config.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::parse_config;
use crate::config::schema::GatewayConfig;

/// Monitors the configuration file and publishes validated reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for reloaded configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();
        let reloader = Mutex::new(Reloader::new(&path));

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &path) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    let Ok(mut reloader) = reloader.lock() else {
                        return;
                    };
                    if let Some(config) = reloader.reload() {
                        let _ = tx.send(config);
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn touches(event: &Event, path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}

/// Re-reads the file and yields a config only when its text changed and it
/// parses and validates.
struct Reloader {
    path: PathBuf,
    last: Option<String>,
}

impl Reloader {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            last: std::fs::read_to_string(path).ok(),
        }
    }

    fn reload(&mut self) -> Option<GatewayConfig> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                // Mid-rename the file may briefly not exist.
                tracing::debug!(path = ?self.path, error = %e, "Config file not readable yet");
                return None;
            }
        };
        if self.last.as_deref() == Some(text.as_str()) {
            return None;
        }

        match parse_config(&text) {
            Ok(config) => {
                tracing::info!(path = ?self.path, "Config file changed, reloading");
                self.last = Some(text);
                Some(config)
            }
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Failed to reload config, keeping current configuration");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::WorkerConfig;
    use notify::EventKind;

    fn config_text(workers: &[&str]) -> String {
        let config = GatewayConfig {
            workers: workers
                .iter()
                .map(|name| WorkerConfig {
                    name: name.to_string(),
                    address: "127.0.0.1:10022".into(),
                    max_connections: 4,
                })
                .collect(),
            ..Default::default()
        };
        toml::to_string(&config).unwrap()
    }

    #[test]
    fn test_reload_only_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, config_text(&["w1"])).unwrap();

        let mut reloader = Reloader::new(&path);
        assert!(reloader.reload().is_none());

        std::fs::write(&path, config_text(&["w1", "w2"])).unwrap();
        let config = reloader.reload().unwrap();
        assert_eq!(config.workers.len(), 2);
        assert!(reloader.reload().is_none());
    }

    #[test]
    fn test_invalid_edit_is_not_published() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, config_text(&["w1"])).unwrap();
        let mut reloader = Reloader::new(&path);

        std::fs::write(&path, "workers = [").unwrap();
        assert!(reloader.reload().is_none());

        std::fs::remove_file(&path).unwrap();
        assert!(reloader.reload().is_none());
    }

    #[test]
    fn test_event_filter_matches_file_name() {
        let path = Path::new("/etc/gateway/gateway.toml");
        let hit = Event::new(EventKind::Any).add_path(PathBuf::from("/etc/gateway/gateway.toml"));
        let miss = Event::new(EventKind::Any).add_path(PathBuf::from("/etc/gateway/other.toml"));
        assert!(touches(&hit, path));
        assert!(!touches(&miss, path));
    }
}
