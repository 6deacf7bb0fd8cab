//! Durable per-browser storage for small scalar values
//!
//! Mirrors the browser `Storage` API (`get_item`/`set_item`/`remove_item`).
//! Only two keys live here: the last selected view and the views-changed
//! stamp. Neither is a source of truth for view content.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Last view the user selected, as `ViewId` display text
pub const LAST_SELECTED_VIEW_KEY: &str = "saved-views:last-selected";
/// Stamp written whenever views change, read by other contexts
pub const VIEWS_CHANGED_KEY: &str = "saved-views:changed-at";

/// Key/value storage shared by every context of one browser profile
pub trait LocalStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

/// In-memory storage; clones share the same map, like tabs of one browser
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalStore {
    items: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalStore for MemoryLocalStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items().remove(key);
    }
}

/// JSON-file storage for native builds
///
/// Every write rewrites the file. I/O failures are logged and otherwise
/// ignored, the same way a full browser storage quota is.
#[derive(Debug)]
pub struct FileLocalStore {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileLocalStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = load_items(&path);
        Self {
            path,
            items: Mutex::new(items),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_items<T>(&self, f: impl FnOnce(&mut BTreeMap<String, String>) -> T) -> T {
        let mut items = self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        // another process may have written since we last looked
        *items = load_items(&self.path);
        f(&mut items)
    }

    fn flush(&self, items: &BTreeMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create storage directory");
                return;
            }
        }
        let json = match serde_json::to_string_pretty(items) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize local storage");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write local storage");
        }
    }
}

impl LocalStore for FileLocalStore {
    fn get_item(&self, key: &str) -> Option<String> {
        self.with_items(|items| items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) {
        self.with_items(|items| {
            items.insert(key.to_string(), value.to_string());
            self.flush(items);
        });
    }

    fn remove_item(&self, key: &str) {
        self.with_items(|items| {
            if items.remove(key).is_some() {
                self.flush(items);
            }
        });
    }
}

fn load_items(path: &Path) -> BTreeMap<String, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read local storage");
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Local storage file is corrupt; starting empty");
        BTreeMap::new()
    })
}
