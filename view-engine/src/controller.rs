//! ViewController - the active view of one table
//!
//! Holds the selection and the overlay of unsaved edits. The baseline is
//! never copied: every read looks the selected id up in the `DraftManager`,
//! following draft-to-durable promotions, so a save elsewhere or a refresh
//! is visible on the next read.
//!
//! ```text
//!   defaults ⊕ baseline (manager) ⊕ overlay (controller) = resolved
//! ```

use std::sync::Arc;
use view_types::{
    DisplayType, FieldKey, FilterType, SortSpec, SubrowContent, View, ViewConfig, ViewId, ViewPatch,
    PLACEHOLDER_VIEW_NAME,
};

use crate::dirty::{self, FieldDiff};
use crate::drafts::{CreatedDraft, DraftManager, LifecycleState, SaveOutcome};
use crate::error::{ViewError, ViewResult};
use crate::merge::{resolve, resolve_view};
use crate::notifier::{ChangeKind, ChangeSubscription};
use crate::storage::{LocalStore, LAST_SELECTED_VIEW_KEY};

pub struct ViewController {
    manager: Arc<DraftManager>,
    storage: Arc<dyn LocalStore>,
    defaults: ViewConfig,
    /// `None` renders the system defaults
    selected: Option<ViewId>,
    overlay: ViewPatch,
    subscription: ChangeSubscription,
}

impl ViewController {
    pub fn new(manager: Arc<DraftManager>, defaults: ViewConfig) -> Self {
        let storage = manager.storage();
        let subscription = manager.notifier().subscribe();
        Self {
            manager,
            storage,
            defaults,
            selected: None,
            overlay: ViewPatch::default(),
            subscription,
        }
    }

    pub fn manager(&self) -> &Arc<DraftManager> {
        &self.manager
    }

    pub fn defaults(&self) -> &ViewConfig {
        &self.defaults
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// The selected view id, with promotions applied
    pub fn selected_id(&self) -> Option<ViewId> {
        self.selected.as_ref().map(|id| self.manager.resolve_alias(id))
    }

    /// Switch views; the overlay is dropped even when the id is unchanged
    pub fn select_view(&mut self, id: Option<ViewId>) -> ViewResult<()> {
        let id = id.map(|id| self.manager.resolve_alias(&id));
        if let Some(id) = &id {
            if !self.manager.contains(id) {
                return Err(ViewError::ViewNotFound(id.clone()));
            }
        }

        tracing::debug!(view_id = ?id.as_ref().map(ToString::to_string), "Selecting view");
        self.overlay = ViewPatch::default();
        self.selected = id;
        self.remember_selection();
        Ok(())
    }

    /// Re-select the view chosen in an earlier session, if it still exists
    pub fn restore_selection(&mut self) -> Option<ViewId> {
        let stored = self.storage.get_item(LAST_SELECTED_VIEW_KEY)?;
        let id = match stored.parse::<ViewId>() {
            Ok(id) => self.manager.resolve_alias(&id),
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring unreadable last selected view");
                return None;
            }
        };
        if !self.manager.contains(&id) {
            tracing::debug!(view_id = %id, "Last selected view no longer exists");
            return None;
        }
        self.overlay = ViewPatch::default();
        self.selected = Some(id.clone());
        Some(id)
    }

    fn remember_selection(&self) {
        match &self.selected {
            Some(id) => self.storage.set_item(LAST_SELECTED_VIEW_KEY, &id.to_string()),
            None => self.storage.remove_item(LAST_SELECTED_VIEW_KEY),
        }
    }

    /// Rewrite a retired draft id to its durable replacement
    fn follow_promotion(&mut self) {
        if let Some(id) = &self.selected {
            let resolved = self.manager.resolve_alias(id);
            if &resolved != id {
                tracing::debug!(draft_id = %id, view_id = %resolved, "Following promoted view");
                self.selected = Some(resolved);
            }
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The selected view as stored, without the overlay
    pub fn baseline(&self) -> Option<View> {
        self.selected_id().and_then(|id| self.manager.get(&id))
    }

    pub fn overlay(&self) -> &ViewPatch {
        &self.overlay
    }

    /// The configuration the table renders
    pub fn resolved(&self) -> ViewConfig {
        let baseline = self.baseline();
        resolve(&self.defaults, baseline.as_ref().map(|view| &view.config), &self.overlay)
    }

    pub fn resolved_view(&self) -> Option<View> {
        self.baseline()
            .map(|baseline| resolve_view(&self.defaults, &baseline, &self.overlay))
    }

    pub fn is_dirty(&self) -> bool {
        let (current, baseline) = self.compare_pair();
        dirty::is_view_dirty(&current, &baseline)
    }

    pub fn diff_summary(&self) -> Vec<FieldDiff> {
        let (current, baseline) = self.compare_pair();
        dirty::diff_summary(&current, &baseline)
    }

    /// Resolved view with and without the overlay
    fn compare_pair(&self) -> (View, View) {
        let baseline = self
            .baseline()
            .unwrap_or_else(|| View::new_draft(PLACEHOLDER_VIEW_NAME, self.defaults.clone()));
        let current = resolve_view(&self.defaults, &baseline, &self.overlay);
        let clean = resolve_view(&self.defaults, &baseline, &ViewPatch::default());
        (current, clean)
    }

    pub fn views(&self) -> Vec<View> {
        self.manager.views()
    }

    pub fn lifecycle(&self) -> Option<LifecycleState> {
        self.selected_id().and_then(|id| self.manager.lifecycle(&id))
    }

    pub fn is_saving(&self) -> bool {
        self.selected_id().is_some_and(|id| self.manager.is_saving(&id))
    }

    // ========================================================================
    // Overlay edits
    // ========================================================================

    pub fn set_column_order<K: Into<FieldKey>>(&mut self, order: impl IntoIterator<Item = K>) {
        let mut config = ViewConfig {
            column_order: order.into_iter().map(Into::into).collect(),
            ..ViewConfig::default()
        };
        config.normalize();
        self.overlay.column_order = Some(config.column_order);
    }

    pub fn set_column_size(&mut self, key: impl Into<FieldKey>, width: u32) {
        self.overlay.column_sizing.insert(key.into(), width);
    }

    pub fn set_column_visibility(&mut self, key: impl Into<FieldKey>, visible: bool) {
        self.overlay.column_visibility.insert(key.into(), visible);
    }

    pub fn set_column_display_type(&mut self, key: impl Into<FieldKey>, display: DisplayType) {
        self.overlay.column_display_types.insert(key.into(), display);
    }

    pub fn set_column_spanning(&mut self, key: impl Into<FieldKey>, spanning: bool) {
        self.overlay.column_spanning.insert(key.into(), spanning);
    }

    pub fn set_filter_visibility(&mut self, key: impl Into<FieldKey>, visible: bool) {
        self.overlay.filter_visibility.insert(key.into(), visible);
    }

    pub fn set_filter_type(&mut self, key: impl Into<FieldKey>, filter: FilterType) {
        self.overlay.filter_types.insert(key.into(), filter);
    }

    /// `None` removes sorting
    pub fn set_sorting(&mut self, sorting: Option<SortSpec>) {
        self.overlay.sorting = Some(sorting);
    }

    pub fn set_subrow_enabled(&mut self, enabled: bool) {
        self.overlay.subrow_enabled = Some(enabled);
    }

    pub fn set_subrow_content(&mut self, content: SubrowContent) {
        self.overlay.subrow_content = Some(content);
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.overlay.name = Some(name.into());
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.overlay.description = Some(description);
    }

    pub fn set_global(&mut self, is_global: bool) {
        self.overlay.is_global = Some(is_global);
    }

    /// Fold a batch of edits into the overlay
    pub fn apply_patch(&mut self, patch: &ViewPatch) {
        self.overlay.merge_from(patch);
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Persist baseline ⊕ overlay ⊕ `explicit`
    ///
    /// The overlay is cleared when the view was saved or kept locally. On any
    /// other failure nothing changes and the error is returned.
    pub async fn save(&mut self, explicit: Option<ViewPatch>) -> ViewResult<SaveOutcome> {
        self.follow_promotion();
        let id = self.selected.clone().ok_or(ViewError::NothingSelected)?;
        let baseline = self
            .manager
            .get(&id)
            .ok_or_else(|| ViewError::ViewNotFound(id.clone()))?;

        let mut content = resolve_view(&self.defaults, &baseline, &self.overlay);
        if let Some(explicit) = &explicit {
            explicit.apply_to(&mut content);
        }
        content.config.normalize();

        let outcome = self.manager.save(&id, content).await?;
        self.overlay = ViewPatch::default();
        self.follow_promotion();
        if outcome.is_local_only() {
            tracing::warn!(view_id = %outcome.view().id, "Saved view locally only");
        }
        Ok(outcome)
    }

    /// Snapshot the current configuration into a new draft and select it
    pub fn create_from_current(&mut self, name: impl Into<String>) -> CreatedDraft {
        let snapshot = self.resolved();
        let created = self.manager.create_draft(View::new_draft(name, snapshot));
        self.overlay = ViewPatch::default();
        self.selected = Some(created.id.clone());
        self.remember_selection();
        created
    }

    /// Drop the overlay and put the selected view back to its last accepted state
    pub fn revert(&mut self) -> ViewResult<()> {
        self.overlay = ViewPatch::default();
        self.follow_promotion();
        match &self.selected {
            Some(id) => self.manager.restore_original(id),
            None => Ok(()),
        }
    }

    /// The editor was dismissed
    pub fn close(&self) {
        self.manager
            .notifier()
            .publish(ChangeKind::EditorClosed, self.selected_id());
    }

    /// Process queued change notifications
    ///
    /// Changes from other contexts trigger a re-fetch. Afterwards a selection
    /// that no longer exists falls back to the defaults. Returns whether any
    /// change was seen.
    pub async fn sync_changes(&mut self) -> bool {
        let changes = self.subscription.drain();
        if changes.is_empty() {
            self.follow_promotion();
            return false;
        }

        if let Some(external) = changes.iter().rev().find(|change| change.is_external()) {
            if let Err(err) = self.manager.refresh(Some(external.stamp.as_str())).await {
                tracing::warn!(stamp = %external.stamp, error = %err, "Failed to refresh views after external change");
            }
        }

        self.follow_promotion();
        if let Some(id) = &self.selected {
            if !self.manager.contains(id) {
                tracing::info!(view_id = %id, "Selected view no longer exists; falling back to defaults");
                self.selected = None;
                self.overlay = ViewPatch::default();
                self.remember_selection();
            }
        }
        true
    }
}
