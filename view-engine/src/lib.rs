//! View Engine - saved table views for the document list
//!
//! Resolves what the table renders from three layers (system defaults, the
//! selected saved view, unsaved edits), tracks whether edits are dirty, and
//! keeps drafts usable whether or not the remote store is reachable.
//! Other contexts sharing the same local storage are told when views change.

pub mod config;
pub mod controller;
pub mod dirty;
pub mod drafts;
pub mod engine;
pub mod error;
pub mod merge;
pub mod notifier;
pub mod storage;
pub mod store;

pub use config::{EngineConfig, ViewDefaults};
pub use controller::ViewController;
pub use drafts::{CreatedDraft, DraftManager, LifecycleState, SaveOutcome};
pub use engine::ViewEngine;
pub use error::{StoreError, ViewError, ViewResult};
pub use notifier::{ChangeKind, ChangeNotifier, ChangeSubscription, ViewChange};
pub use storage::{FileLocalStore, LocalStore, MemoryLocalStore};
pub use store::{MemoryViewStore, OfflineViewStore, RestViewStore, ViewStore};
