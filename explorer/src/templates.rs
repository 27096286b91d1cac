//! Page template set with hot reload
//!
//! The presentation layer reads the current set through `TemplateStore::current`.
//! A reload builds a complete new set and swaps it in one step; a reload that
//! fails part way leaves the previous set untouched.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::TemplateConfig;
use crate::error::{ExplorerError, Result};

/// A named page template together with the shared partials it is parsed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub source: String,
    pub shared: String,
}

#[derive(Debug, Default)]
pub struct TemplateSet {
    templates: HashMap<String, Template>,
    generation: u64,
}

impl TemplateSet {
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Number of successful loads that preceded this set, starting at 0.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct TemplateStore {
    current: ArcSwap<TemplateSet>,
    dir: PathBuf,
    names: Vec<String>,
    shared: String,
    loads: AtomicU64,
}

impl TemplateStore {
    /// Reads every configured template. Fails if any file is unreadable.
    pub fn load(config: &TemplateConfig) -> Result<Self> {
        let initial = read_set(&config.dir, &config.names, &config.shared, 0)?;
        info!(dir = ?config.dir, count = initial.len(), "Loaded page templates");

        Ok(Self {
            current: ArcSwap::from_pointee(initial),
            dir: config.dir.clone(),
            names: config.names.clone(),
            shared: config.shared.clone(),
            loads: AtomicU64::new(1),
        })
    }

    pub fn current(&self) -> Arc<TemplateSet> {
        self.current.load_full()
    }

    /// Re-reads all templates and swaps them in if every one loaded.
    pub fn reload(&self) -> Result<()> {
        let generation = self.loads.load(Ordering::SeqCst);
        let next = read_set(&self.dir, &self.names, &self.shared, generation)?;
        self.current.store(Arc::new(next));
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn read_set(dir: &Path, names: &[String], shared: &str, generation: u64) -> Result<TemplateSet> {
    let shared_source = read_template(dir, shared)?;

    let mut templates = HashMap::with_capacity(names.len());
    for name in names {
        let source = read_template(dir, name)?;
        templates.insert(
            name.clone(),
            Template {
                name: name.clone(),
                source,
                shared: shared_source.clone(),
            },
        );
    }

    Ok(TemplateSet { templates, generation })
}

fn read_template(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(format!("{}.tmpl", name));
    fs::read_to_string(&path).map_err(|source| ExplorerError::Template {
        name: name.to_string(),
        source,
    })
}

/// Reloads `store` once per trigger until the trigger channel closes.
pub fn spawn_reload_listener(store: Arc<TemplateStore>, mut triggers: mpsc::Receiver<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while triggers.recv().await.is_some() {
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.reload()).await {
                Ok(Ok(())) => info!("Explorer UI html templates reparsed"),
                Ok(Err(e)) => error!("Template reload failed, keeping previous set: {}", e),
                Err(e) => error!("Template reload task panicked: {}", e),
            }
        }
    })
}

/// Feeds SIGHUP deliveries into a reload trigger channel.
#[cfg(unix)]
pub fn sighup_triggers() -> Result<mpsc::Receiver<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("Received SIGHUP");
            // A pending trigger already covers this signal.
            if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(()) {
                break;
            }
        }
    });
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_for(dir: &Path) -> TemplateConfig {
        TemplateConfig {
            dir: dir.to_path_buf(),
            names: vec!["home".to_string(), "block".to_string()],
            shared: "extras".to_string(),
            reload_on_sighup: false,
        }
    }

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(format!("{}.tmpl", name)), body).unwrap();
    }

    #[test]
    fn test_load_reads_all_templates() {
        let dir = tempdir().unwrap();
        write(dir.path(), "extras", "{{define \"footer\"}}{{end}}");
        write(dir.path(), "home", "home v1");
        write(dir.path(), "block", "block v1");

        let store = TemplateStore::load(&config_for(dir.path())).unwrap();
        let set = store.current();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("home").unwrap().source, "home v1");
        assert!(set.get("block").unwrap().shared.contains("footer"));
        assert_eq!(set.generation(), 0);
    }

    #[test]
    fn test_missing_template_fails_load() {
        let dir = tempdir().unwrap();
        write(dir.path(), "extras", "");
        write(dir.path(), "home", "home");

        let result = TemplateStore::load(&config_for(dir.path()));
        assert!(matches!(result, Err(ExplorerError::Template { ref name, .. }) if name == "block"));
    }

    #[test]
    fn test_failed_reload_keeps_previous_set() {
        let dir = tempdir().unwrap();
        write(dir.path(), "extras", "");
        write(dir.path(), "home", "home v1");
        write(dir.path(), "block", "block v1");
        let store = TemplateStore::load(&config_for(dir.path())).unwrap();

        write(dir.path(), "home", "home v2");
        fs::remove_file(dir.path().join("block.tmpl")).unwrap();

        assert!(store.reload().is_err());
        assert_eq!(store.current().get("home").unwrap().source, "home v1");
    }

    #[tokio::test]
    async fn test_listener_swaps_on_trigger() {
        let dir = tempdir().unwrap();
        write(dir.path(), "extras", "");
        write(dir.path(), "home", "home v1");
        write(dir.path(), "block", "block v1");
        let store = Arc::new(TemplateStore::load(&config_for(dir.path())).unwrap());

        // A reader holding the old set keeps it across the swap.
        let before = store.current();

        let (trigger, triggers) = mpsc::channel(1);
        let listener = spawn_reload_listener(store.clone(), triggers);

        write(dir.path(), "home", "home v2");
        trigger.send(()).await.unwrap();
        drop(trigger);
        listener.await.unwrap();

        assert_eq!(before.get("home").unwrap().source, "home v1");
        let after = store.current();
        assert_eq!(after.get("home").unwrap().source, "home v2");
        assert_eq!(after.generation(), 1);
    }
}
