//! Config merge: defaults ⊕ baseline ⊕ overlay
//!
//! Sequences and scalars are replaced whole by the highest layer that sets
//! them. Per-column and per-filter maps are merged key by key, so toggling
//! one column's visibility never touches another column's width.
//!
//! Everything here is pure and cheap enough to run on every render.

use std::collections::BTreeMap;

use view_types::{FieldKey, View, ViewConfig, ViewPatch};

/// Resolve the configuration the table renders
///
/// A baseline `column_order` that is empty counts as unset, as do `None`
/// scalars. A missing baseline is an empty layer.
pub fn resolve(defaults: &ViewConfig, baseline: Option<&ViewConfig>, overlay: &ViewPatch) -> ViewConfig {
    let mut resolved = defaults.clone();
    if let Some(baseline) = baseline {
        layer_config(&mut resolved, baseline);
    }
    overlay.apply_to_config(&mut resolved);
    resolved
}

/// Resolve a whole view: metadata from baseline and overlay, config from all three layers
pub fn resolve_view(defaults: &ViewConfig, baseline: &View, overlay: &ViewPatch) -> View {
    let mut view = baseline.clone();
    view.config = resolve(defaults, Some(&baseline.config), overlay);
    if let Some(name) = &overlay.name {
        view.name = name.clone();
    }
    if let Some(description) = &overlay.description {
        view.description = description.clone();
    }
    if let Some(is_global) = overlay.is_global {
        view.is_global = is_global;
    }
    view
}

/// Apply `patch` to a copy of `view`
pub fn apply_patch(view: &View, patch: &ViewPatch) -> View {
    let mut next = view.clone();
    patch.apply_to(&mut next);
    next
}

fn layer_config(target: &mut ViewConfig, layer: &ViewConfig) {
    if !layer.column_order.is_empty() {
        target.column_order = layer.column_order.clone();
    }
    layer_map(&mut target.column_sizing, &layer.column_sizing);
    layer_map(&mut target.column_visibility, &layer.column_visibility);
    layer_map(&mut target.column_display_types, &layer.column_display_types);
    layer_map(&mut target.column_spanning, &layer.column_spanning);
    layer_map(&mut target.filter_visibility, &layer.filter_visibility);
    layer_map(&mut target.filter_types, &layer.filter_types);
    if layer.subrow_enabled.is_some() {
        target.subrow_enabled = layer.subrow_enabled;
    }
    if layer.subrow_content.is_some() {
        target.subrow_content = layer.subrow_content;
    }
    if layer.sorting.is_some() {
        target.sorting = layer.sorting.clone();
    }
}

fn layer_map<V: Clone>(target: &mut BTreeMap<FieldKey, V>, layer: &BTreeMap<FieldKey, V>) {
    for (key, value) in layer {
        target.insert(key.clone(), value.clone());
    }
}
