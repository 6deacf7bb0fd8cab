//! Remote view storage
//!
//! `ViewStore` is the boundary to the REST CRUD service. The engine only ever
//! talks to it through this trait; `rest::RestViewStore` is the HTTP
//! implementation, `MemoryViewStore` an in-process one (offline use and
//! tests), and `OfflineViewStore` a store that is never reachable.

pub mod rest;

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use view_types::{View, ViewPayload, ViewRecord, ViewScope};

use crate::error::StoreError;

pub use rest::RestViewStore;

/// CRUD access to persisted views
#[async_trait]
pub trait ViewStore: Send + Sync {
    async fn list_views(&self, scope: ViewScope) -> Result<Vec<View>, StoreError>;

    async fn get_view(&self, id: i64) -> Result<View, StoreError>;

    /// Persist a new view; the returned view carries its durable id
    async fn create_view(&self, payload: &ViewPayload) -> Result<View, StoreError>;

    async fn update_view(&self, id: i64, payload: &ViewPayload) -> Result<View, StoreError>;

    async fn delete_view(&self, id: i64) -> Result<(), StoreError>;
}

/// In-process store that assigns ids and audit fields like the server does
pub struct MemoryViewStore {
    inner: Mutex<MemoryInner>,
}

struct MemoryInner {
    owner: String,
    next_id: i64,
    records: BTreeMap<i64, ViewRecord>,
    failures: VecDeque<StoreError>,
    calls: usize,
}

impl MemoryViewStore {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                owner: owner.into(),
                next_id: 1,
                records: BTreeMap::new(),
                failures: VecDeque::new(),
                calls: 0,
            }),
        }
    }

    /// Make the next call fail with `error` (for testing)
    pub fn fail_next(&self, error: StoreError) {
        self.lock().failures.push_back(error);
    }

    /// Number of calls made so far (for testing)
    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    /// Insert a record directly, as if another user had saved it
    pub fn seed(&self, payload: ViewPayload) -> View {
        let mut inner = self.lock();
        inner.insert(payload).into()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        let mut inner = self.lock();
        inner.calls += 1;
        match inner.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(inner),
        }
    }
}

impl Default for MemoryViewStore {
    fn default() -> Self {
        Self::new("local")
    }
}

impl MemoryInner {
    fn insert(&mut self, payload: ViewPayload) -> ViewRecord {
        let id = self.next_id;
        self.next_id += 1;
        let now = Utc::now();
        let record = ViewRecord::from_payload(id, payload, Some(self.owner.clone()), now, now);
        self.records.insert(id, record.clone());
        record
    }
}

fn validate(payload: &ViewPayload) -> Result<(), StoreError> {
    if payload.name.trim().is_empty() {
        return Err(StoreError::Validation("name: This field may not be blank.".to_string()));
    }
    Ok(())
}

#[async_trait]
impl ViewStore for MemoryViewStore {
    async fn list_views(&self, scope: ViewScope) -> Result<Vec<View>, StoreError> {
        let inner = self.begin()?;
        let owner = inner.owner.clone();
        Ok(inner
            .records
            .values()
            .filter(|record| match scope {
                ViewScope::All => true,
                ViewScope::Global => record.is_global,
                ViewScope::Mine => record.owner.as_deref() == Some(owner.as_str()),
            })
            .cloned()
            .map(View::from)
            .collect())
    }

    async fn get_view(&self, id: i64) -> Result<View, StoreError> {
        let inner = self.begin()?;
        inner
            .records
            .get(&id)
            .cloned()
            .map(View::from)
            .ok_or_else(|| StoreError::NotFound(format!("saved view {id}")))
    }

    async fn create_view(&self, payload: &ViewPayload) -> Result<View, StoreError> {
        let mut inner = self.begin()?;
        validate(payload)?;
        Ok(inner.insert(payload.clone()).into())
    }

    async fn update_view(&self, id: i64, payload: &ViewPayload) -> Result<View, StoreError> {
        let mut inner = self.begin()?;
        validate(payload)?;
        let existing = inner
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("saved view {id}")))?;
        let created = existing.created.unwrap_or_else(Utc::now);
        let record = ViewRecord::from_payload(id, payload.clone(), existing.owner, created, Utc::now());
        inner.records.insert(id, record.clone());
        Ok(record.into())
    }

    async fn delete_view(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.begin()?;
        inner
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("saved view {id}")))
    }
}

/// A store with no backend; every call reports the endpoint as unavailable
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineViewStore;

impl OfflineViewStore {
    fn unavailable<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("no view store configured".to_string()))
    }
}

#[async_trait]
impl ViewStore for OfflineViewStore {
    async fn list_views(&self, _scope: ViewScope) -> Result<Vec<View>, StoreError> {
        Self::unavailable()
    }

    async fn get_view(&self, _id: i64) -> Result<View, StoreError> {
        Self::unavailable()
    }

    async fn create_view(&self, _payload: &ViewPayload) -> Result<View, StoreError> {
        Self::unavailable()
    }

    async fn update_view(&self, _id: i64, _payload: &ViewPayload) -> Result<View, StoreError> {
        Self::unavailable()
    }

    async fn delete_view(&self, _id: i64) -> Result<(), StoreError> {
        Self::unavailable()
    }
}
