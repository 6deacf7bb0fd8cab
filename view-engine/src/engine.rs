use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use crate::config::{EngineConfig, ViewDefaults};
use crate::controller::ViewController;
use crate::drafts::DraftManager;
use crate::error::ViewResult;
use crate::notifier::ChangeNotifier;
use crate::storage::{FileLocalStore, LocalStore};
use crate::store::{OfflineViewStore, RestViewStore, ViewStore};

/// One browsing context: a draft manager, its notifier and the defaults
///
/// Cheap to clone; every controller created from the same engine shares the
/// registry and sees the same change stream.
#[derive(Clone)]
pub struct ViewEngine {
    inner: Arc<ViewEngineInner>,
}

struct ViewEngineInner {
    config: EngineConfig,
    defaults: ViewDefaults,
    manager: Arc<DraftManager>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ViewEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn ViewStore>, storage: Arc<dyn LocalStore>) -> Self {
        let defaults = config.load_defaults();
        let notifier = ChangeNotifier::new(storage);
        let manager = DraftManager::new(store, notifier, config.auto_persist_drafts);
        Self {
            inner: Arc::new(ViewEngineInner {
                config,
                defaults,
                manager,
                watcher: Mutex::new(None),
            }),
        }
    }

    /// REST store when a base URL is configured, otherwise local-only
    pub fn from_config(config: EngineConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn ViewStore> = match &config.api_base_url {
            Some(base_url) => {
                tracing::info!(base_url = %base_url, "Using REST view store");
                Arc::new(RestViewStore::new(
                    base_url.clone(),
                    config.api_token.clone(),
                    config.http_timeout,
                )?)
            }
            None => {
                tracing::info!("No view API configured; views stay local");
                Arc::new(OfflineViewStore)
            }
        };
        let storage = Arc::new(FileLocalStore::open(config.state_path.clone()));
        Ok(Self::new(config, store, storage))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn defaults(&self) -> &ViewDefaults {
        &self.inner.defaults
    }

    pub fn manager(&self) -> Arc<DraftManager> {
        Arc::clone(&self.inner.manager)
    }

    pub fn notifier(&self) -> Arc<ChangeNotifier> {
        Arc::clone(self.inner.manager.notifier())
    }

    pub fn controller(&self) -> ViewController {
        ViewController::new(self.manager(), self.inner.defaults.view.clone())
    }

    /// Fetch the persisted view list
    pub async fn load(&self) -> ViewResult<bool> {
        self.inner.manager.refresh(None).await
    }

    /// Start polling for changes made by other contexts; idempotent
    pub fn start_change_watcher(&self) {
        let mut watcher = self.inner.watcher.lock().unwrap_or_else(|p| p.into_inner());
        if watcher.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        let interval = self.inner.config.change_poll_interval;
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Starting change watcher");
        *watcher = Some(self.notifier().spawn_flag_watcher(interval));
    }

    pub fn stop_change_watcher(&self) {
        let mut watcher = self.inner.watcher.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(handle) = watcher.take() {
            handle.abort();
        }
    }
}
