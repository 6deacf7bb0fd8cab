//! Saved view types shared between the view engine and the document UI
//!
//! A saved view is a named table configuration: column order, per-column
//! maps (sizing, visibility, display type, spanning), filter settings and
//! subrow/sorting options.
//!
//! - Domain types (`View`, `ViewConfig`, `ViewPatch`) are what the engine works on
//! - Wire types (`ViewRecord`, `ViewPayload`) mirror the REST API and are
//!   exported to TypeScript
//!
//! Every key that enters through a wire type or a UI call is canonicalized by
//! `FieldKey::parse`, so `5`, `"5"` and `"customField_5"` are the same column.

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

// ============================================================================
// Identity
// ============================================================================

/// Prefix carried by every locally synthesized view id
pub const DRAFT_ID_PREFIX: &str = "draft-";

/// Name given to views the user has not named yet
pub const PLACEHOLDER_VIEW_NAME: &str = "Untitled view";

/// Identity of a view: durable (server-assigned) or a local draft id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewId {
    Durable(i64),
    Draft(String),
}

impl ViewId {
    /// Synthesize a fresh draft id
    pub fn new_draft() -> Self {
        Self::Draft(format!("{DRAFT_ID_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    /// True when the remote store knows this id (updates may be sent as PATCH)
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Durable(_))
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft(_))
    }

    pub fn durable(&self) -> Option<i64> {
        match self {
            Self::Durable(id) => Some(*id),
            Self::Draft(_) => None,
        }
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewId::Durable(id) => write!(f, "{id}"),
            ViewId::Draft(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ViewId {
    fn from(id: i64) -> Self {
        Self::Durable(id)
    }
}

/// Error returned when a string is neither a durable nor a draft view id
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid view id: {0:?}")]
pub struct ParseViewIdError(pub String);

impl FromStr for ViewId {
    type Err = ParseViewIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Ok(Self::Durable(id));
        }
        match s.strip_prefix(DRAFT_ID_PREFIX) {
            Some(rest) if !rest.is_empty() => Ok(Self::Draft(s.to_string())),
            _ => Err(ParseViewIdError(s.to_string())),
        }
    }
}

impl Serialize for ViewId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ViewId::Durable(id) => serializer.serialize_i64(*id),
            ViewId::Draft(id) => serializer.serialize_str(id),
        }
    }
}

impl<'de> Deserialize<'de> for ViewId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ViewIdVisitor;

        impl Visitor<'_> for ViewIdVisitor {
            type Value = ViewId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer view id or a draft id string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ViewId, E> {
                Ok(ViewId::Durable(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ViewId, E> {
                i64::try_from(v)
                    .map(ViewId::Durable)
                    .map_err(|_| E::custom(format!("view id out of range: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ViewId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(ViewIdVisitor)
    }
}

// ============================================================================
// Field Keys
// ============================================================================

/// Prefix used by the UI for custom field columns and filters
pub const CUSTOM_FIELD_PREFIX: &str = "customField_";

/// Canonical identity of a column or filter
///
/// Built-in fields are identified by a short string key, custom fields by
/// their numeric id. Ordering is total so per-key maps can be `BTreeMap`s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Builtin(String),
    Custom(u32),
}

impl FieldKey {
    /// Canonicalize a raw key from any source
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let numeric = raw.strip_prefix(CUSTOM_FIELD_PREFIX).unwrap_or(raw);
        if !numeric.is_empty() && numeric.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = numeric.parse::<u32>() {
                return Self::Custom(id);
            }
        }
        Self::Builtin(raw.to_string())
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self::Builtin(name.into())
    }

    pub fn custom(id: u32) -> Self {
        Self::Custom(id)
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Prefixed form the UI uses for widget ids (`customField_<n>`)
    pub fn prefixed(&self) -> String {
        match self {
            FieldKey::Builtin(name) => name.clone(),
            FieldKey::Custom(id) => format!("{CUSTOM_FIELD_PREFIX}{id}"),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Builtin(name) => f.write_str(name),
            FieldKey::Custom(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for FieldKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for FieldKey {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<u32> for FieldKey {
    fn from(id: u32) -> Self {
        Self::Custom(id)
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldKey::Builtin(name) => serializer.serialize_str(name),
            // serde_json writes integer map keys as "<n>"
            FieldKey::Custom(id) => serializer.serialize_u32(*id),
        }
    }
}

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldKeyVisitor;

        impl Visitor<'_> for FieldKeyVisitor {
            type Value = FieldKey;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a field key string or a custom field id")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldKey, E> {
                u32::try_from(v)
                    .map(FieldKey::Custom)
                    .map_err(|_| E::custom(format!("custom field id out of range: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldKey, E> {
                u32::try_from(v)
                    .map(FieldKey::Custom)
                    .map_err(|_| E::custom(format!("custom field id out of range: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldKey, E> {
                Ok(FieldKey::parse(v))
            }
        }

        deserializer.deserialize_any(FieldKeyVisitor)
    }
}

/// Fields the table can actually render
///
/// Column ids outside the catalog are skipped at render time, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldCatalog {
    pub builtins: BTreeSet<String>,
    pub custom: BTreeSet<u32>,
}

impl FieldCatalog {
    pub fn new(
        builtins: impl IntoIterator<Item = impl Into<String>>,
        custom: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            builtins: builtins.into_iter().map(Into::into).collect(),
            custom: custom.into_iter().collect(),
        }
    }

    pub fn contains(&self, key: &FieldKey) -> bool {
        match key {
            FieldKey::Builtin(name) => self.builtins.contains(name),
            FieldKey::Custom(id) => self.custom.contains(id),
        }
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// How a column renders its cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/view-types.ts")]
pub enum DisplayType {
    Text,
    Badge,
    Date,
    RelativeDate,
    Link,
    Thumbnail,
    /// Value written by a newer server
    #[serde(other)]
    Unknown,
}

/// Which widget a filter renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/view-types.ts")]
pub enum FilterType {
    Text,
    Select,
    MultiSelect,
    DateRange,
    NumberRange,
    Boolean,
    #[serde(other)]
    Unknown,
}

/// What the expandable subrow under each document shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/view-types.ts")]
pub enum SubrowContent {
    Tags,
    Notes,
    CustomFields,
    ContentPreview,
    #[serde(other)]
    Unknown,
}

/// Single-column sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: FieldKey,
    #[serde(default)]
    pub reverse: bool,
}

impl SortSpec {
    pub fn new(field: impl Into<FieldKey>, reverse: bool) -> Self {
        Self {
            field: field.into(),
            reverse,
        }
    }
}

// ============================================================================
// View Configuration
// ============================================================================

/// The resolvable part of a view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Display order; no duplicates
    #[serde(default)]
    pub column_order: Vec<FieldKey>,
    #[serde(default)]
    pub column_sizing: BTreeMap<FieldKey, u32>,
    /// Absent keys are visible
    #[serde(default)]
    pub column_visibility: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    pub column_display_types: BTreeMap<FieldKey, DisplayType>,
    /// Column spans two stacked rows
    #[serde(default)]
    pub column_spanning: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    pub filter_visibility: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    pub filter_types: BTreeMap<FieldKey, FilterType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subrow_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subrow_content: Option<SubrowContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting: Option<SortSpec>,
}

impl ViewConfig {
    /// Drop repeated column ids, keeping the first occurrence.
    /// Returns how many were removed.
    pub fn normalize(&mut self) -> usize {
        let before = self.column_order.len();
        let mut seen = BTreeSet::new();
        self.column_order.retain(|key| seen.insert(key.clone()));
        before - self.column_order.len()
    }

    pub fn is_column_visible(&self, key: &FieldKey) -> bool {
        self.column_visibility.get(key).copied().unwrap_or(true)
    }

    pub fn is_filter_visible(&self, key: &FieldKey) -> bool {
        self.filter_visibility.get(key).copied().unwrap_or(true)
    }

    /// Columns to render, in order: known to the catalog and not hidden
    pub fn visible_columns(&self, catalog: &FieldCatalog) -> Vec<FieldKey> {
        self.column_order
            .iter()
            .filter(|key| catalog.contains(key) && self.is_column_visible(key))
            .cloned()
            .collect()
    }
}

// ============================================================================
// View
// ============================================================================

/// A named, shareable table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub id: ViewId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    pub config: ViewConfig,
    /// Server-assigned audit fields, never sent back
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl View {
    /// A local-only view under a fresh draft id
    pub fn new_draft(name: impl Into<String>, config: ViewConfig) -> Self {
        let name = name.into();
        Self {
            id: ViewId::new_draft(),
            name: if name.trim().is_empty() {
                PLACEHOLDER_VIEW_NAME.to_string()
            } else {
                name
            },
            description: None,
            is_global: false,
            config,
            owner: None,
            created: None,
            modified: None,
        }
    }

    /// Whether the user gave this view a name; the placeholder does not count
    pub fn has_name(&self) -> bool {
        let name = self.name.trim();
        !name.is_empty() && name != PLACEHOLDER_VIEW_NAME
    }
}

// ============================================================================
// Overlay
// ============================================================================

/// Sparse edit layered over a view
///
/// `None` scalars and empty maps leave the underlying value untouched.
/// `sorting: Some(None)` explicitly removes sorting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_global: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_order: Option<Vec<FieldKey>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_sizing: BTreeMap<FieldKey, u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_visibility: BTreeMap<FieldKey, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_display_types: BTreeMap<FieldKey, DisplayType>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub column_spanning: BTreeMap<FieldKey, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter_visibility: BTreeMap<FieldKey, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter_types: BTreeMap<FieldKey, FilterType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subrow_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subrow_content: Option<SubrowContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sorting: Option<Option<SortSpec>>,
}

impl ViewPatch {
    /// A patch that sets every field of `view`
    pub fn from_view(view: &View) -> Self {
        let mut patch = Self::from_config(&view.config);
        patch.name = Some(view.name.clone());
        patch.description = Some(view.description.clone());
        patch.is_global = Some(view.is_global);
        patch
    }

    /// A patch that sets every configuration field
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            column_order: Some(config.column_order.clone()),
            column_sizing: config.column_sizing.clone(),
            column_visibility: config.column_visibility.clone(),
            column_display_types: config.column_display_types.clone(),
            column_spanning: config.column_spanning.clone(),
            filter_visibility: config.filter_visibility.clone(),
            filter_types: config.filter_types.clone(),
            subrow_enabled: config.subrow_enabled,
            subrow_content: config.subrow_content,
            sorting: Some(config.sorting.clone()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.is_global.is_none()
            && self.column_order.is_none()
            && self.column_sizing.is_empty()
            && self.column_visibility.is_empty()
            && self.column_display_types.is_empty()
            && self.column_spanning.is_empty()
            && self.filter_visibility.is_empty()
            && self.filter_types.is_empty()
            && self.subrow_enabled.is_none()
            && self.subrow_content.is_none()
            && self.sorting.is_none()
    }

    /// Fold a later patch into this one; `other` wins field by field and key by key
    pub fn merge_from(&mut self, other: &ViewPatch) {
        if let Some(name) = &other.name {
            self.name = Some(name.clone());
        }
        if let Some(description) = &other.description {
            self.description = Some(description.clone());
        }
        if let Some(is_global) = other.is_global {
            self.is_global = Some(is_global);
        }
        if let Some(order) = &other.column_order {
            self.column_order = Some(order.clone());
        }
        extend(&mut self.column_sizing, &other.column_sizing);
        extend(&mut self.column_visibility, &other.column_visibility);
        extend(&mut self.column_display_types, &other.column_display_types);
        extend(&mut self.column_spanning, &other.column_spanning);
        extend(&mut self.filter_visibility, &other.filter_visibility);
        extend(&mut self.filter_types, &other.filter_types);
        if let Some(enabled) = other.subrow_enabled {
            self.subrow_enabled = Some(enabled);
        }
        if let Some(content) = other.subrow_content {
            self.subrow_content = Some(content);
        }
        if let Some(sorting) = &other.sorting {
            self.sorting = Some(sorting.clone());
        }
    }

    /// Write the configuration fields of this patch onto `config`
    pub fn apply_to_config(&self, config: &mut ViewConfig) {
        if let Some(order) = &self.column_order {
            config.column_order = order.clone();
        }
        extend(&mut config.column_sizing, &self.column_sizing);
        extend(&mut config.column_visibility, &self.column_visibility);
        extend(&mut config.column_display_types, &self.column_display_types);
        extend(&mut config.column_spanning, &self.column_spanning);
        extend(&mut config.filter_visibility, &self.filter_visibility);
        extend(&mut config.filter_types, &self.filter_types);
        if let Some(enabled) = self.subrow_enabled {
            config.subrow_enabled = Some(enabled);
        }
        if let Some(content) = self.subrow_content {
            config.subrow_content = Some(content);
        }
        if let Some(sorting) = &self.sorting {
            config.sorting = sorting.clone();
        }
    }

    /// Write metadata and configuration onto `view`
    pub fn apply_to(&self, view: &mut View) {
        if let Some(name) = &self.name {
            view.name = name.clone();
        }
        if let Some(description) = &self.description {
            view.description = description.clone();
        }
        if let Some(is_global) = self.is_global {
            view.is_global = is_global;
        }
        self.apply_to_config(&mut view.config);
    }
}

fn extend<V: Clone>(target: &mut BTreeMap<FieldKey, V>, source: &BTreeMap<FieldKey, V>) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// A saved view as returned by the REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/view-types.ts")]
pub struct ViewRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    #[ts(type = "Array<string | number>")]
    pub column_order: Vec<FieldKey>,
    #[serde(default)]
    #[ts(type = "Record<string, number>")]
    pub column_sizing: BTreeMap<FieldKey, u32>,
    #[serde(default)]
    #[ts(type = "Record<string, boolean>")]
    pub column_visibility: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    #[ts(type = "Record<string, DisplayType>")]
    pub column_display_types: BTreeMap<FieldKey, DisplayType>,
    #[serde(default)]
    #[ts(type = "Record<string, boolean>")]
    pub column_spanning: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    #[ts(type = "Record<string, boolean>")]
    pub filter_visibility: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    #[ts(type = "Record<string, FilterType>")]
    pub filter_types: BTreeMap<FieldKey, FilterType>,
    #[serde(default)]
    pub subrow_enabled: Option<bool>,
    #[serde(default)]
    pub subrow_content: Option<SubrowContent>,
    #[serde(default)]
    #[ts(type = "string | number | null")]
    pub sort_field: Option<FieldKey>,
    #[serde(default)]
    pub sort_reverse: bool,
    /// Owner username
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
}

impl ViewRecord {
    /// Build the record a server would return after storing `payload`
    pub fn from_payload(
        id: i64,
        payload: ViewPayload,
        owner: Option<String>,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: payload.name,
            description: payload.description,
            is_global: payload.is_global,
            column_order: payload.column_order,
            column_sizing: payload.column_sizing,
            column_visibility: payload.column_visibility,
            column_display_types: payload.column_display_types,
            column_spanning: payload.column_spanning,
            filter_visibility: payload.filter_visibility,
            filter_types: payload.filter_types,
            subrow_enabled: payload.subrow_enabled,
            subrow_content: payload.subrow_content,
            sort_field: payload.sort_field,
            sort_reverse: payload.sort_reverse,
            owner,
            created: Some(created),
            modified: Some(modified),
        }
    }
}

impl From<ViewRecord> for View {
    fn from(record: ViewRecord) -> Self {
        let mut config = ViewConfig {
            column_order: record.column_order,
            column_sizing: record.column_sizing,
            column_visibility: record.column_visibility,
            column_display_types: record.column_display_types,
            column_spanning: record.column_spanning,
            filter_visibility: record.filter_visibility,
            filter_types: record.filter_types,
            subrow_enabled: record.subrow_enabled,
            subrow_content: record.subrow_content,
            sorting: record.sort_field.map(|field| SortSpec {
                field,
                reverse: record.sort_reverse,
            }),
        };
        let removed = config.normalize();
        if removed > 0 {
            tracing::warn!(
                view_id = record.id,
                removed,
                "Dropped duplicate column ids from stored view"
            );
        }

        View {
            id: ViewId::Durable(record.id),
            name: record.name,
            description: record.description,
            is_global: record.is_global,
            config,
            owner: record.owner,
            created: record.created,
            modified: record.modified,
        }
    }
}

/// Body of create and update requests; audit fields are never client-writable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/view-types.ts")]
pub struct ViewPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    #[ts(type = "Array<string | number>")]
    pub column_order: Vec<FieldKey>,
    #[serde(default)]
    #[ts(type = "Record<string, number>")]
    pub column_sizing: BTreeMap<FieldKey, u32>,
    #[serde(default)]
    #[ts(type = "Record<string, boolean>")]
    pub column_visibility: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    #[ts(type = "Record<string, DisplayType>")]
    pub column_display_types: BTreeMap<FieldKey, DisplayType>,
    #[serde(default)]
    #[ts(type = "Record<string, boolean>")]
    pub column_spanning: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    #[ts(type = "Record<string, boolean>")]
    pub filter_visibility: BTreeMap<FieldKey, bool>,
    #[serde(default)]
    #[ts(type = "Record<string, FilterType>")]
    pub filter_types: BTreeMap<FieldKey, FilterType>,
    #[serde(default)]
    pub subrow_enabled: Option<bool>,
    #[serde(default)]
    pub subrow_content: Option<SubrowContent>,
    #[serde(default)]
    #[ts(type = "string | number | null")]
    pub sort_field: Option<FieldKey>,
    #[serde(default)]
    pub sort_reverse: bool,
}

impl From<&View> for ViewPayload {
    fn from(view: &View) -> Self {
        let config = &view.config;
        Self {
            name: view.name.clone(),
            description: view.description.clone(),
            is_global: view.is_global,
            column_order: config.column_order.clone(),
            column_sizing: config.column_sizing.clone(),
            column_visibility: config.column_visibility.clone(),
            column_display_types: config.column_display_types.clone(),
            column_spanning: config.column_spanning.clone(),
            filter_visibility: config.filter_visibility.clone(),
            filter_types: config.filter_types.clone(),
            subrow_enabled: config.subrow_enabled,
            subrow_content: config.subrow_content,
            sort_field: config.sorting.as_ref().map(|s| s.field.clone()),
            sort_reverse: config.sorting.as_ref().is_some_and(|s| s.reverse),
        }
    }
}

/// Scope filter for listing views
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewScope {
    #[default]
    All,
    Mine,
    Global,
}

impl ViewScope {
    pub fn as_query(&self) -> Option<&'static str> {
        match self {
            ViewScope::All => None,
            ViewScope::Mine => Some("mine"),
            ViewScope::Global => Some("global"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
