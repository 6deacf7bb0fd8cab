//! Dirty comparison between a resolved configuration and its baseline
//!
//! Only documented view fields are inspected. Sequences compare in order;
//! maps compare by size and then in a single ordered pass, so the cost is
//! linear in the size of the configuration.

use std::collections::BTreeMap;

use serde::Serialize;
use view_types::{View, ViewConfig};

/// A configuration field that differs between two views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDiff {
    Name,
    Description,
    IsGlobal,
    ColumnOrder,
    ColumnSizing,
    ColumnVisibility,
    ColumnDisplayTypes,
    ColumnSpanning,
    FilterVisibility,
    FilterTypes,
    SubrowEnabled,
    SubrowContent,
    Sorting,
}

impl FieldDiff {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::IsGlobal => "is_global",
            Self::ColumnOrder => "column_order",
            Self::ColumnSizing => "column_sizing",
            Self::ColumnVisibility => "column_visibility",
            Self::ColumnDisplayTypes => "column_display_types",
            Self::ColumnSpanning => "column_spanning",
            Self::FilterVisibility => "filter_visibility",
            Self::FilterTypes => "filter_types",
            Self::SubrowEnabled => "subrow_enabled",
            Self::SubrowContent => "subrow_content",
            Self::Sorting => "sorting",
        }
    }
}

impl std::fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when `current` differs materially from `baseline`
pub fn is_dirty(current: &ViewConfig, baseline: &ViewConfig) -> bool {
    sequence_differs(&current.column_order, &baseline.column_order)
        || map_differs(&current.column_sizing, &baseline.column_sizing)
        || map_differs(&current.column_visibility, &baseline.column_visibility)
        || map_differs(&current.column_display_types, &baseline.column_display_types)
        || map_differs(&current.column_spanning, &baseline.column_spanning)
        || map_differs(&current.filter_visibility, &baseline.filter_visibility)
        || map_differs(&current.filter_types, &baseline.filter_types)
        || current.subrow_enabled != baseline.subrow_enabled
        || current.subrow_content != baseline.subrow_content
        || current.sorting != baseline.sorting
}

/// Like `is_dirty`, plus name, description and scope
pub fn is_view_dirty(current: &View, baseline: &View) -> bool {
    current.name != baseline.name
        || current.description != baseline.description
        || current.is_global != baseline.is_global
        || is_dirty(&current.config, &baseline.config)
}

/// Fields that differ, for debugging
pub fn diff_summary(current: &View, baseline: &View) -> Vec<FieldDiff> {
    let (c, b) = (&current.config, &baseline.config);
    let checks = [
        (FieldDiff::Name, current.name != baseline.name),
        (FieldDiff::Description, current.description != baseline.description),
        (FieldDiff::IsGlobal, current.is_global != baseline.is_global),
        (FieldDiff::ColumnOrder, sequence_differs(&c.column_order, &b.column_order)),
        (FieldDiff::ColumnSizing, map_differs(&c.column_sizing, &b.column_sizing)),
        (
            FieldDiff::ColumnVisibility,
            map_differs(&c.column_visibility, &b.column_visibility),
        ),
        (
            FieldDiff::ColumnDisplayTypes,
            map_differs(&c.column_display_types, &b.column_display_types),
        ),
        (FieldDiff::ColumnSpanning, map_differs(&c.column_spanning, &b.column_spanning)),
        (
            FieldDiff::FilterVisibility,
            map_differs(&c.filter_visibility, &b.filter_visibility),
        ),
        (FieldDiff::FilterTypes, map_differs(&c.filter_types, &b.filter_types)),
        (FieldDiff::SubrowEnabled, c.subrow_enabled != b.subrow_enabled),
        (FieldDiff::SubrowContent, c.subrow_content != b.subrow_content),
        (FieldDiff::Sorting, c.sorting != b.sorting),
    ];
    checks
        .into_iter()
        .filter_map(|(field, differs)| differs.then_some(field))
        .collect()
}

fn sequence_differs<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    a.len() != b.len() || a.iter().zip(b).any(|(x, y)| x != y)
}

fn map_differs<K: Ord, V: PartialEq>(a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> bool {
    // equal sizes and sorted keys: pairwise walk covers every key in either map
    a.len() != b.len() || a.iter().zip(b).any(|((ka, va), (kb, vb))| ka != kb || va != vb)
}
