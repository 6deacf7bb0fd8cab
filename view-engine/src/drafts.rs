//! DraftManager - local drafts, the persisted view cache and their lifecycle
//!
//! Every view the UI can select lives here, either as a server copy in the
//! persisted cache or as a registry entry:
//!
//! - keyed by a draft id: a view the server has never seen
//! - keyed by a durable id: a local edit shadowing the server copy
//!
//! A write moves an entry through `UnsavedDraft -> PersistPending ->
//! Persisted | PersistFailedLocal`. When a create succeeds the draft id is
//! retired and an alias `draft id -> durable id` is recorded under the same
//! lock, so nobody ever observes the view under both ids or under neither.
//!
//! The registry lock is a `std::sync::Mutex` and is never held across an
//! `.await`; store calls happen between two short critical sections.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use view_types::{View, ViewId, ViewPatch, ViewPayload, ViewScope};

use crate::error::{StoreError, ViewError, ViewResult};
use crate::notifier::{ChangeKind, ChangeNotifier};
use crate::storage::{LocalStore, LAST_SELECTED_VIEW_KEY};
use crate::store::ViewStore;

// ============================================================================
// Types
// ============================================================================

/// Where a view stands relative to the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum LifecycleState {
    UnsavedDraft,
    PersistPending,
    Persisted,
    /// The last write could not reach the store; the view is kept locally
    PersistFailedLocal { reason: String },
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::UnsavedDraft => write!(f, "unsaved_draft"),
            LifecycleState::PersistPending => write!(f, "persist_pending"),
            LifecycleState::Persisted => write!(f, "persisted"),
            LifecycleState::PersistFailedLocal { reason } => write!(f, "persist_failed_local: {reason}"),
        }
    }
}

/// A registry entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftEntry {
    pub view: View,
    /// Last state the user explicitly accepted; `revert` goes back here
    pub original: View,
    pub lifecycle: LifecycleState,
    /// Bumped on every local edit
    pub revision: u64,
    pub last_error: Option<String>,
}

impl DraftEntry {
    fn new(view: View) -> Self {
        Self {
            original: view.clone(),
            view,
            lifecycle: LifecycleState::UnsavedDraft,
            revision: 0,
            last_error: None,
        }
    }
}

/// Result of a write that did not fail outright
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The store accepted the write; the view carries its durable id
    Persisted(View),
    /// The store was unreachable; the view was kept locally
    LocalOnly { view: View, reason: String },
}

impl SaveOutcome {
    pub fn view(&self) -> &View {
        match self {
            SaveOutcome::Persisted(view) => view,
            SaveOutcome::LocalOnly { view, .. } => view,
        }
    }

    pub fn is_local_only(&self) -> bool {
        matches!(self, SaveOutcome::LocalOnly { .. })
    }
}

/// A freshly created draft and its background persist attempt
#[derive(Debug)]
pub struct CreatedDraft {
    pub id: ViewId,
    /// `None` when automatic persistence is disabled
    pub persist: Option<JoinHandle<ViewResult<SaveOutcome>>>,
}

/// Retired draft ids kept resolvable for controllers that have not synced yet
const MAX_PROMOTION_ALIASES: usize = 256;

/// A claimed write slot: the content to send and what to restore on failure
struct WriteTicket {
    id: ViewId,
    content: View,
    revision: u64,
    previous: LifecycleState,
}

#[derive(Default)]
struct Registry {
    /// Server copies in server order
    persisted: IndexMap<i64, View>,
    drafts: IndexMap<ViewId, DraftEntry>,
    /// Retired draft ids and the durable id that replaced them, oldest first
    promotions: IndexMap<String, i64>,
    /// Views with a remote call outstanding
    in_flight: HashSet<ViewId>,
    last_refresh_stamp: Option<String>,
    /// Bumped by every local write to `persisted`
    generation: u64,
    /// Generation of the last local write per durable view
    recent_writes: HashMap<i64, u64>,
    /// Start generation of the last refresh that replaced the cache
    applied_refresh: Option<u64>,
}

impl Registry {
    fn resolve_alias(&self, id: &ViewId) -> ViewId {
        match id {
            ViewId::Draft(draft) => self
                .promotions
                .get(draft)
                .map(|durable| ViewId::Durable(*durable))
                .unwrap_or_else(|| id.clone()),
            ViewId::Durable(_) => id.clone(),
        }
    }

    fn get(&self, id: &ViewId) -> Option<&View> {
        if let Some(entry) = self.drafts.get(id) {
            return Some(&entry.view);
        }
        id.durable().and_then(|durable| self.persisted.get(&durable))
    }

    fn record_write(&mut self, durable: i64) {
        self.generation += 1;
        self.recent_writes.insert(durable, self.generation);
    }

    fn record_promotion(&mut self, draft: String, durable: i64) {
        self.promotions.insert(draft, durable);
        if self.promotions.len() > MAX_PROMOTION_ALIASES {
            self.promotions.shift_remove_index(0);
        }
    }

    fn forget(&mut self, durable: i64) {
        self.persisted.shift_remove(&durable);
        self.drafts.shift_remove(&ViewId::Durable(durable));
        self.promotions.retain(|_, target| *target != durable);
        self.record_write(durable);
    }
}

// ============================================================================
// DraftManager
// ============================================================================

pub struct DraftManager {
    store: Arc<dyn ViewStore>,
    notifier: Arc<ChangeNotifier>,
    auto_persist: bool,
    registry: Mutex<Registry>,
}

impl DraftManager {
    pub fn new(store: Arc<dyn ViewStore>, notifier: Arc<ChangeNotifier>, auto_persist: bool) -> Arc<Self> {
        Arc::new(Self {
            store,
            notifier,
            auto_persist,
            registry: Mutex::new(Registry::default()),
        })
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn storage(&self) -> Arc<dyn LocalStore> {
        self.notifier.storage()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Persisted views (shadows replacing their server copy), then drafts in creation order
    pub fn views(&self) -> Vec<View> {
        let registry = self.registry();
        let mut views: Vec<View> = registry
            .persisted
            .iter()
            .map(|(durable, server)| {
                registry
                    .drafts
                    .get(&ViewId::Durable(*durable))
                    .map(|entry| &entry.view)
                    .unwrap_or(server)
                    .clone()
            })
            .collect();
        views.extend(
            registry
                .drafts
                .iter()
                .filter(|(id, _)| id.is_draft())
                .map(|(_, entry)| entry.view.clone()),
        );
        views
    }

    /// The view under exactly `id`; retired draft ids are not found
    pub fn get(&self, id: &ViewId) -> Option<View> {
        self.registry().get(id).cloned()
    }

    pub fn contains(&self, id: &ViewId) -> bool {
        self.registry().get(id).is_some()
    }

    /// Map a retired draft id to the durable id that replaced it
    pub fn resolve_alias(&self, id: &ViewId) -> ViewId {
        self.registry().resolve_alias(id)
    }

    /// Server copy, ignoring any local shadow
    pub fn persisted(&self, id: i64) -> Option<View> {
        self.registry().persisted.get(&id).cloned()
    }

    pub fn entry(&self, id: &ViewId) -> Option<DraftEntry> {
        self.registry().drafts.get(id).cloned()
    }

    /// What `revert` would restore
    pub fn original(&self, id: &ViewId) -> Option<View> {
        let registry = self.registry();
        match registry.drafts.get(id) {
            Some(entry) => Some(entry.original.clone()),
            None => id.durable().and_then(|durable| registry.persisted.get(&durable).cloned()),
        }
    }

    pub fn lifecycle(&self, id: &ViewId) -> Option<LifecycleState> {
        let registry = self.registry();
        if registry.in_flight.contains(id) {
            return Some(LifecycleState::PersistPending);
        }
        if let Some(entry) = registry.drafts.get(id) {
            return Some(entry.lifecycle.clone());
        }
        id.durable()
            .filter(|durable| registry.persisted.contains_key(durable))
            .map(|_| LifecycleState::Persisted)
    }

    pub fn last_error(&self, id: &ViewId) -> Option<String> {
        self.registry().drafts.get(id).and_then(|entry| entry.last_error.clone())
    }

    pub fn is_saving(&self, id: &ViewId) -> bool {
        let registry = self.registry();
        registry.in_flight.contains(&registry.resolve_alias(id))
    }

    // ------------------------------------------------------------------------
    // Local mutations
    // ------------------------------------------------------------------------

    /// Register `view` as a new draft and start persisting it in the background
    ///
    /// The draft is selectable as soon as this returns. The persist slot is
    /// claimed before the task is spawned, so a save racing the background
    /// create is rejected instead of producing a second view.
    pub fn create_draft(self: &Arc<Self>, mut view: View) -> CreatedDraft {
        if !view.id.is_draft() {
            view.id = ViewId::new_draft();
        }
        view.config.normalize();
        let id = view.id.clone();
        self.registry().drafts.insert(id.clone(), DraftEntry::new(view));
        tracing::info!(view_id = %id, "Created draft view");
        self.notifier.publish(ChangeKind::Created, Some(id.clone()));

        let persist = if self.auto_persist {
            match self.begin_write(&id, None) {
                Ok(ticket) => {
                    let manager = Arc::clone(self);
                    Some(tokio::spawn(async move { manager.run_write(ticket).await }))
                }
                Err(err) => {
                    // unnamed drafts wait for an explicit save
                    tracing::debug!(view_id = %id, error = %err, "Not persisting draft yet");
                    None
                }
            }
        } else {
            None
        };

        CreatedDraft { id, persist }
    }

    /// Apply `patch` to the local copy of a view; never writes remotely
    ///
    /// For a durable view without a shadow, the shadow is created from the
    /// server copy.
    pub fn update(&self, id: &ViewId, patch: &ViewPatch) -> ViewResult<View> {
        let mut guard = self.registry();
        let registry = &mut *guard;
        let id = registry.resolve_alias(id);

        let view = match registry.drafts.get_mut(&id) {
            Some(entry) => {
                patch.apply_to(&mut entry.view);
                entry.view.config.normalize();
                entry.revision += 1;
                if entry.lifecycle != LifecycleState::PersistPending {
                    entry.lifecycle = LifecycleState::UnsavedDraft;
                }
                entry.view.clone()
            }
            None => {
                let server = id
                    .durable()
                    .and_then(|durable| registry.persisted.get(&durable))
                    .cloned()
                    .ok_or_else(|| ViewError::ViewNotFound(id.clone()))?;
                let mut entry = DraftEntry::new(server);
                patch.apply_to(&mut entry.view);
                entry.view.config.normalize();
                entry.revision = 1;
                let view = entry.view.clone();
                registry.drafts.insert(id.clone(), entry);
                view
            }
        };
        drop(guard);

        tracing::debug!(view_id = %id, "Updated local view");
        self.notifier.publish(ChangeKind::Updated, Some(id));
        Ok(view)
    }

    /// Put a view back to its last accepted state
    ///
    /// A shadow that ends up equal to the server copy is dropped.
    pub fn restore_original(&self, id: &ViewId) -> ViewResult<()> {
        let mut guard = self.registry();
        let registry = &mut *guard;
        let id = registry.resolve_alias(id);

        let Some(entry) = registry.drafts.get_mut(&id) else {
            return match registry.get(&id) {
                Some(_) => Ok(()),
                None => Err(ViewError::ViewNotFound(id)),
            };
        };
        if entry.view == entry.original {
            return Ok(());
        }
        entry.view = entry.original.clone();
        entry.revision += 1;

        let matches_server = id
            .durable()
            .and_then(|durable| registry.persisted.get(&durable))
            .is_some_and(|server| *server == entry.view);
        if matches_server && !registry.in_flight.contains(&id) {
            registry.drafts.shift_remove(&id);
        }
        drop(guard);

        tracing::debug!(view_id = %id, "Restored view to its original state");
        self.notifier.publish(ChangeKind::Updated, Some(id));
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Remote operations
    // ------------------------------------------------------------------------

    /// Persist `content` as the new state of `id`
    ///
    /// Drafts are created, durable views updated. Unreachable stores degrade
    /// to `SaveOutcome::LocalOnly`; any other failure is returned and leaves
    /// the registry as it was.
    pub async fn save(&self, id: &ViewId, content: View) -> ViewResult<SaveOutcome> {
        let ticket = self.begin_write(id, Some(content))?;
        self.run_write(ticket).await
    }

    /// Persist the current local state of `id` again
    pub async fn retry(&self, id: &ViewId) -> ViewResult<SaveOutcome> {
        let ticket = self.begin_write(id, None)?;
        tracing::info!(view_id = %ticket.id, "Retrying view persistence");
        self.run_write(ticket).await
    }

    /// Drop local changes; durable views are re-fetched from the store
    pub async fn discard(&self, id: &ViewId) -> ViewResult<()> {
        let (id, removed) = {
            let mut registry = self.registry();
            let id = registry.resolve_alias(id);
            if registry.in_flight.contains(&id) {
                return Err(ViewError::SaveInProgress(id));
            }
            if registry.get(&id).is_none() {
                return Err(ViewError::ViewNotFound(id));
            }
            let removed = registry.drafts.shift_remove(&id);
            if removed.is_some() && !id.is_draft() {
                registry.in_flight.insert(id.clone());
            }
            (id, removed)
        };

        let Some(durable) = id.durable() else {
            tracing::info!(view_id = %id, "Discarded draft view");
            self.notifier.publish(ChangeKind::Deleted, Some(id));
            return Ok(());
        };

        if removed.is_some() {
            let fetched = self.store.get_view(durable).await;
            {
                let mut registry = self.registry();
                registry.in_flight.remove(&id);
                if let Ok(server) = &fetched {
                    registry.persisted.insert(durable, server.clone());
                    registry.record_write(durable);
                }
            }
            if let Err(err) = fetched {
                tracing::warn!(view_id = durable, error = %err, "Failed to re-fetch view; keeping cached copy");
            }
            self.notifier.publish(ChangeKind::Updated, Some(id));
        }
        Ok(())
    }

    /// Delete a view; returns `false` when the store could not be reached
    pub async fn delete_view(&self, id: &ViewId) -> ViewResult<bool> {
        let id = {
            let mut registry = self.registry();
            let id = registry.resolve_alias(id);
            if registry.in_flight.contains(&id) {
                return Err(ViewError::SaveInProgress(id));
            }
            if registry.get(&id).is_none() {
                return Err(ViewError::ViewNotFound(id));
            }
            if id.is_draft() {
                registry.drafts.shift_remove(&id);
            } else {
                registry.in_flight.insert(id.clone());
            }
            id
        };

        if let Some(durable) = id.durable() {
            let result = self.store.delete_view(durable).await;
            let mut registry = self.registry();
            registry.in_flight.remove(&id);
            match result {
                Ok(()) => registry.forget(durable),
                Err(err) if err.is_endpoint_unavailable() => {
                    drop(registry);
                    tracing::warn!(view_id = durable, error = %err, "View store unavailable; view not deleted");
                    return Ok(false);
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::info!(view_id = %id, "Deleted view");
        self.notifier.publish(ChangeKind::Deleted, Some(id));
        Ok(true)
    }

    /// Re-fetch the persisted list
    ///
    /// `stamp` is the change stamp that prompted the refresh; a stamp that
    /// was already handled is skipped. Returns whether the cache was replaced.
    ///
    /// Local writes committed while the list was in flight are newer than
    /// the list and survive it; so does every view they promoted.
    pub async fn refresh(&self, stamp: Option<&str>) -> ViewResult<bool> {
        let started = {
            let registry = self.registry();
            if let Some(stamp) = stamp {
                if registry.last_refresh_stamp.as_deref() == Some(stamp) {
                    tracing::debug!(stamp, "View list already refreshed for stamp");
                    return Ok(false);
                }
            }
            registry.generation
        };

        let views = match self.store.list_views(ViewScope::All).await {
            Ok(views) => views,
            Err(err) if err.is_endpoint_unavailable() => {
                tracing::warn!(error = %err, "View store unavailable; keeping cached views");
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };

        let mut guard = self.registry();
        let registry = &mut *guard;
        if let Some(stamp) = stamp {
            registry.last_refresh_stamp = Some(stamp.to_string());
        }
        if registry.applied_refresh.is_some_and(|applied| applied > started) {
            tracing::debug!(started, "Discarding view list older than the cache");
            return Ok(false);
        }

        let mut persisted: IndexMap<i64, View> = views
            .into_iter()
            .filter_map(|view| view.id.durable().map(|durable| (durable, view)))
            .collect();
        for (durable, written) in &registry.recent_writes {
            if *written <= started {
                continue;
            }
            match registry.persisted.get(durable) {
                Some(local) => {
                    persisted.insert(*durable, local.clone());
                }
                None => {
                    persisted.shift_remove(durable);
                }
            }
        }
        registry.persisted = persisted;
        registry.recent_writes.retain(|_, written| *written > started);
        registry.applied_refresh = Some(started);

        let vanished: Vec<ViewId> = registry
            .drafts
            .keys()
            .filter(|id| {
                matches!(id.durable(), Some(durable) if !registry.persisted.contains_key(&durable))
                    && !registry.in_flight.contains(*id)
            })
            .cloned()
            .collect();
        for id in vanished {
            tracing::warn!(view_id = %id, "View deleted remotely; dropping local changes");
            registry.drafts.shift_remove(&id);
        }
        let live = &registry.persisted;
        registry.promotions.retain(|_, durable| live.contains_key(durable));

        tracing::debug!(count = registry.persisted.len(), "Refreshed persisted views");
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Write pipeline
    // ------------------------------------------------------------------------

    /// Claim the single write slot of a view
    fn begin_write(&self, id: &ViewId, content: Option<View>) -> ViewResult<WriteTicket> {
        let mut guard = self.registry();
        let registry = &mut *guard;
        let id = registry.resolve_alias(id);

        if registry.in_flight.contains(&id) {
            return Err(ViewError::SaveInProgress(id));
        }
        let current = registry
            .get(&id)
            .cloned()
            .ok_or_else(|| ViewError::ViewNotFound(id.clone()))?;
        let mut content = content.unwrap_or(current);
        content.id = id.clone();
        if !content.has_name() {
            return Err(ViewError::NameRequired);
        }

        let (revision, previous) = match registry.drafts.get_mut(&id) {
            Some(entry) => {
                let previous = std::mem::replace(&mut entry.lifecycle, LifecycleState::PersistPending);
                (entry.revision, previous)
            }
            None => (0, LifecycleState::Persisted),
        };
        registry.in_flight.insert(id.clone());

        Ok(WriteTicket {
            id,
            content,
            revision,
            previous,
        })
    }

    async fn run_write(&self, ticket: WriteTicket) -> ViewResult<SaveOutcome> {
        let payload = ViewPayload::from(&ticket.content);
        let result = match ticket.id.durable() {
            Some(durable) => self.store.update_view(durable, &payload).await,
            None => self.store.create_view(&payload).await,
        };

        match result {
            Ok(saved) => Ok(self.commit_persisted(ticket, saved)),
            Err(err) if err.is_endpoint_unavailable() => Ok(self.commit_local(ticket, err)),
            Err(err) => Err(self.abort_write(ticket, err)),
        }
    }

    fn commit_persisted(&self, ticket: WriteTicket, saved: View) -> SaveOutcome {
        let saved_id = saved.id.clone();
        let promoted_from = {
            let mut guard = self.registry();
            let registry = &mut *guard;
            registry.in_flight.remove(&ticket.id);

            let edited_meanwhile = registry
                .drafts
                .shift_remove(&ticket.id)
                .filter(|entry| entry.revision != ticket.revision);
            if let Some(durable) = saved_id.durable() {
                registry.persisted.insert(durable, saved.clone());
                registry.record_write(durable);
            }
            if let Some(mut entry) = edited_meanwhile {
                entry.view.id = saved_id.clone();
                entry.original = saved.clone();
                entry.lifecycle = LifecycleState::UnsavedDraft;
                entry.last_error = None;
                registry.drafts.insert(saved_id.clone(), entry);
            }

            match (&ticket.id, saved_id.durable()) {
                (ViewId::Draft(draft), Some(durable)) => {
                    registry.record_promotion(draft.clone(), durable);
                    Some(ticket.id.clone())
                }
                _ => None,
            }
        };

        match promoted_from {
            Some(from) => {
                let storage = self.storage();
                if storage.get_item(LAST_SELECTED_VIEW_KEY).as_deref() == Some(from.to_string().as_str()) {
                    storage.set_item(LAST_SELECTED_VIEW_KEY, &saved_id.to_string());
                }
                tracing::info!(draft_id = %from, view_id = %saved_id, "Promoted draft view");
                self.notifier.publish(ChangeKind::Promoted { from }, Some(saved_id));
            }
            None => {
                tracing::info!(view_id = %saved_id, "Persisted view");
                self.notifier.publish(ChangeKind::Updated, Some(saved_id));
            }
        }
        SaveOutcome::Persisted(saved)
    }

    fn commit_local(&self, ticket: WriteTicket, err: StoreError) -> SaveOutcome {
        let reason = err.to_string();
        let view = {
            let mut registry = self.registry();
            registry.in_flight.remove(&ticket.id);
            let entry = registry
                .drafts
                .entry(ticket.id.clone())
                .or_insert_with(|| DraftEntry::new(ticket.content.clone()));
            if entry.revision == ticket.revision {
                entry.view = ticket.content.clone();
            }
            entry.original = ticket.content.clone();
            entry.lifecycle = LifecycleState::PersistFailedLocal { reason: reason.clone() };
            entry.last_error = Some(reason.clone());
            entry.view.clone()
        };

        tracing::warn!(view_id = %ticket.id, error = %err, "View store unavailable; keeping view locally");
        self.notifier.publish(ChangeKind::Updated, Some(ticket.id));
        SaveOutcome::LocalOnly { view, reason }
    }

    fn abort_write(&self, ticket: WriteTicket, err: StoreError) -> ViewError {
        {
            let mut registry = self.registry();
            registry.in_flight.remove(&ticket.id);
            if let Some(entry) = registry.drafts.get_mut(&ticket.id) {
                entry.lifecycle = ticket.previous;
                entry.last_error = Some(err.to_string());
            }
        }
        tracing::error!(view_id = %ticket.id, error = %err, "Failed to persist view");
        ViewError::Store(err)
    }
}
