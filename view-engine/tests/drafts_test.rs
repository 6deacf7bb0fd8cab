//! Draft lifecycle integration tests
//!
//! Promotion from draft id to durable id, degradation to local-only, and the
//! unified view list.

use std::sync::Arc;

use view_engine::storage::LAST_SELECTED_VIEW_KEY;
use view_engine::{
    ChangeKind, ChangeNotifier, DraftManager, LifecycleState, LocalStore, MemoryLocalStore, MemoryViewStore,
    OfflineViewStore, SaveOutcome, StoreError, ViewController, ViewError, ViewStore,
};
use view_types::{FieldKey, View, ViewConfig, ViewId, ViewPatch, ViewPayload, ViewScope};

fn manager(store: Arc<dyn ViewStore>, storage: &MemoryLocalStore, auto_persist: bool) -> Arc<DraftManager> {
    let notifier = ChangeNotifier::new(Arc::new(storage.clone()));
    DraftManager::new(store, notifier, auto_persist)
}

fn draft(name: &str) -> View {
    View::new_draft(
        name,
        ViewConfig {
            column_order: vec!["title".into(), "asn".into()],
            ..ViewConfig::default()
        },
    )
}

fn width(width: u32) -> ViewPatch {
    let mut patch = ViewPatch::default();
    patch.column_sizing.insert("asn".into(), width);
    patch
}

#[tokio::test]
async fn test_promotion_retires_draft_id() {
    let store = Arc::new(MemoryViewStore::new("alice"));
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, true);
    let mut changes = manager.notifier().subscribe();

    let created = manager.create_draft(draft("Numbers"));
    storage.set_item(LAST_SELECTED_VIEW_KEY, &created.id.to_string());
    assert_eq!(manager.lifecycle(&created.id), Some(LifecycleState::PersistPending));

    let outcome = created.persist.unwrap().await.unwrap().unwrap();
    let durable = outcome.view().id.clone();

    assert!(manager.get(&created.id).is_none());
    assert!(!manager.contains(&created.id));
    assert_eq!(manager.resolve_alias(&created.id), durable);
    assert_eq!(manager.get(&durable).unwrap().name, "Numbers");
    assert_eq!(manager.lifecycle(&durable), Some(LifecycleState::Persisted));
    assert_eq!(storage.get_item(LAST_SELECTED_VIEW_KEY), Some(durable.to_string()));

    let kinds: Vec<ChangeKind> = changes.drain().into_iter().map(|change| change.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ChangeKind::Created,
            ChangeKind::Promoted {
                from: created.id.clone()
            }
        ]
    );

    let remote = store.list_views(ViewScope::All).await.unwrap();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].owner.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_edits_during_create_survive_as_shadow() {
    let store = Arc::new(MemoryViewStore::default());
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, true);

    let created = manager.create_draft(draft("Busy"));
    // lands before the spawned create runs
    manager.update(&created.id, &width(140)).unwrap();

    let outcome = created.persist.unwrap().await.unwrap().unwrap();
    let durable = outcome.view().id.clone();

    let server = manager.persisted(1).unwrap();
    assert!(server.config.column_sizing.is_empty());
    let shadow = manager.entry(&durable).expect("shadow under durable id");
    assert_eq!(shadow.view.id, durable);
    assert_eq!(shadow.view.config.column_sizing.get(&"asn".into()), Some(&140));
    assert_eq!(shadow.original, server);
    assert_eq!(manager.lifecycle(&durable), Some(LifecycleState::UnsavedDraft));

    // the unified list shows the local edit in place of the server copy
    assert_eq!(manager.views(), vec![shadow.view.clone()]);

    manager.retry(&durable).await.unwrap();
    assert!(manager.entry(&durable).is_none());
    assert_eq!(
        store.get_view(1).await.unwrap().config.column_sizing.get(&"asn".into()),
        Some(&140)
    );
}

#[tokio::test]
async fn test_update_never_writes_remotely() {
    let store = Arc::new(MemoryViewStore::default());
    let seeded = store.seed(ViewPayload::from(&draft("Remote")));
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, false);
    manager.refresh(None).await.unwrap();

    let calls = store.call_count();
    manager.update(&seeded.id, &width(75)).unwrap();
    let local = manager.create_draft(draft("Local"));
    manager.update(&local.id, &width(60)).unwrap();
    assert_eq!(store.call_count(), calls);

    let views = manager.views();
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].config.column_sizing.get(&"asn".into()), Some(&75));
    assert_eq!(views[1].id, local.id);
    assert_eq!(manager.entry(&local.id).unwrap().revision, 1);
}

#[tokio::test]
async fn test_endpoint_missing_degrades_to_local_only() {
    let storage = MemoryLocalStore::new();
    let manager = manager(Arc::new(OfflineViewStore), &storage, true);

    let created = manager.create_draft(draft("Offline"));
    let outcome = created.persist.unwrap().await.unwrap().unwrap();
    let SaveOutcome::LocalOnly { view, reason } = outcome else {
        panic!("expected a local-only outcome");
    };
    assert_eq!(view.id, created.id);
    assert!(reason.contains("unavailable"));

    assert!(matches!(
        manager.lifecycle(&created.id),
        Some(LifecycleState::PersistFailedLocal { .. })
    ));
    assert!(manager.last_error(&created.id).is_some());
    assert!(manager.contains(&created.id));

    // still editable, and retries stay local
    manager.update(&created.id, &width(10)).unwrap();
    assert_eq!(manager.lifecycle(&created.id), Some(LifecycleState::UnsavedDraft));
    let retried = manager.retry(&created.id).await.unwrap();
    assert!(retried.is_local_only());
    assert_eq!(retried.view().config.column_sizing.get(&"asn".into()), Some(&10));
}

#[tokio::test]
async fn test_forbidden_update_keeps_shadow() {
    let store = Arc::new(MemoryViewStore::default());
    let seeded = store.seed(ViewPayload::from(&draft("Shared")));
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, false);
    manager.refresh(None).await.unwrap();

    let mut content = seeded.clone();
    content.name = "Renamed".to_string();
    store.fail_next(StoreError::Forbidden("not the owner".to_string()));
    let outcome = manager.save(&seeded.id, content).await.unwrap();

    assert!(outcome.is_local_only());
    assert_eq!(manager.get(&seeded.id).unwrap().name, "Renamed");
    assert_eq!(manager.persisted(1).unwrap().name, "Shared");
    assert_eq!(store.get_view(1).await.unwrap().name, "Shared");
}

#[tokio::test]
async fn test_validation_error_leaves_draft_untouched() {
    let store = Arc::new(MemoryViewStore::default());
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, false);
    let created = manager.create_draft(draft("Draft"));
    let before = manager.entry(&created.id).unwrap();

    let mut content = before.view.clone();
    content.config.column_sizing.insert(FieldKey::Custom(2), 5);
    store.fail_next(StoreError::Validation("column_sizing: too narrow".to_string()));
    let err = manager.save(&created.id, content).await.unwrap_err();

    assert_eq!(
        err,
        ViewError::Store(StoreError::Validation("column_sizing: too narrow".to_string()))
    );
    let after = manager.entry(&created.id).unwrap();
    assert_eq!(after.view, before.view);
    assert_eq!(after.lifecycle, LifecycleState::UnsavedDraft);
    assert_eq!(after.last_error.as_deref(), Some("Validation failed: column_sizing: too narrow"));
    assert!(!manager.is_saving(&created.id));
}

#[tokio::test]
async fn test_discard_and_delete() {
    let store = Arc::new(MemoryViewStore::default());
    let seeded = store.seed(ViewPayload::from(&draft("Remote")));
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, false);
    manager.refresh(None).await.unwrap();

    let local = manager.create_draft(draft("Scratch"));
    manager.discard(&local.id).await.unwrap();
    assert!(!manager.contains(&local.id));
    assert_eq!(
        manager.discard(&local.id).await.unwrap_err(),
        ViewError::ViewNotFound(local.id.clone())
    );

    assert!(manager.delete_view(&seeded.id).await.unwrap());
    assert!(manager.views().is_empty());
    assert!(store.get_view(1).await.is_err());
    assert_eq!(
        manager.delete_view(&ViewId::Durable(1)).await.unwrap_err(),
        ViewError::ViewNotFound(ViewId::Durable(1))
    );
}

/// Which store call waits for a permit before it answers
#[derive(Clone, Copy, PartialEq, Eq)]
enum Gated {
    Lists,
    Updates,
    Deletes,
}

/// Store whose gated calls hang until `release` is called
struct GatedStore {
    inner: MemoryViewStore,
    gated: Gated,
    gate: tokio::sync::Semaphore,
}

impl GatedStore {
    fn new(inner: MemoryViewStore, gated: Gated) -> Self {
        Self {
            inner,
            gated,
            gate: tokio::sync::Semaphore::new(0),
        }
    }

    fn release(&self) {
        self.gate.add_permits(1);
    }

    async fn hold(&self, call: Gated) -> Result<(), StoreError> {
        if call == self.gated {
            self.gate
                .acquire()
                .await
                .map_err(|e| StoreError::Unexpected(e.to_string()))?
                .forget();
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ViewStore for GatedStore {
    async fn list_views(&self, scope: ViewScope) -> Result<Vec<View>, StoreError> {
        // the response is read now and delivered late
        let views = self.inner.list_views(scope).await;
        self.hold(Gated::Lists).await?;
        views
    }

    async fn get_view(&self, id: i64) -> Result<View, StoreError> {
        self.inner.get_view(id).await
    }

    async fn create_view(&self, payload: &ViewPayload) -> Result<View, StoreError> {
        self.inner.create_view(payload).await
    }

    async fn update_view(&self, id: i64, payload: &ViewPayload) -> Result<View, StoreError> {
        self.hold(Gated::Updates).await?;
        self.inner.update_view(id, payload).await
    }

    async fn delete_view(&self, id: i64) -> Result<(), StoreError> {
        self.hold(Gated::Deletes).await?;
        self.inner.delete_view(id).await
    }
}

#[tokio::test]
async fn test_concurrent_writes_send_one_request() {
    let inner = MemoryViewStore::default();
    let seeded = inner.seed(ViewPayload::from(&draft("Contended")));
    let store = Arc::new(GatedStore::new(inner, Gated::Updates));
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, false);
    manager.refresh(None).await.unwrap();
    let calls = store.inner.call_count();

    let (first, second) = futures::join!(manager.retry(&seeded.id), async {
        let result = manager.retry(&seeded.id).await;
        store.release();
        result
    });

    assert!(matches!(first, Ok(SaveOutcome::Persisted(_))));
    assert_eq!(second.unwrap_err(), ViewError::SaveInProgress(seeded.id.clone()));
    assert_eq!(store.inner.call_count(), calls + 1);
}

#[tokio::test]
async fn test_save_is_rejected_while_delete_is_pending() {
    let inner = MemoryViewStore::default();
    let seeded = inner.seed(ViewPayload::from(&draft("Doomed")));
    let store = Arc::new(GatedStore::new(inner, Gated::Deletes));
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, false);
    manager.refresh(None).await.unwrap();
    let calls = store.inner.call_count();

    let (deleted, saved) = futures::join!(manager.delete_view(&seeded.id), async {
        let result = manager.retry(&seeded.id).await;
        store.release();
        result
    });

    assert!(deleted.unwrap());
    assert_eq!(saved.unwrap_err(), ViewError::SaveInProgress(seeded.id.clone()));
    assert_eq!(store.inner.call_count(), calls + 1);
    assert!(!manager.is_saving(&seeded.id));
    assert!(!manager.contains(&seeded.id));
}

#[tokio::test]
async fn test_slow_refresh_keeps_view_promoted_meanwhile() {
    let store = Arc::new(GatedStore::new(MemoryViewStore::default(), Gated::Lists));
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, true);
    let mut controller = ViewController::new(manager.clone(), ViewConfig::default());

    let (refreshed, durable) = futures::join!(manager.refresh(None), async {
        let created = controller.create_from_current("Mine");
        let outcome = created.persist.unwrap().await.unwrap().unwrap();
        store.release();
        outcome.view().id.clone()
    });

    assert!(refreshed.unwrap());
    assert_eq!(durable, ViewId::Durable(1));
    assert_eq!(manager.get(&durable).map(|view| view.name), Some("Mine".to_string()));
    assert_eq!(manager.views().len(), 1);

    controller.sync_changes().await;
    assert_eq!(controller.selected_id(), Some(durable));
}

#[tokio::test]
async fn test_slow_refresh_does_not_resurrect_deleted_view() {
    let inner = MemoryViewStore::default();
    let seeded = inner.seed(ViewPayload::from(&draft("Removed")));
    let store = Arc::new(GatedStore::new(inner, Gated::Lists));
    let storage = MemoryLocalStore::new();
    let manager = manager(store.clone(), &storage, false);
    store.release();
    manager.refresh(None).await.unwrap();

    let (refreshed, deleted) = futures::join!(manager.refresh(None), async {
        let deleted = manager.delete_view(&seeded.id).await;
        store.release();
        deleted
    });

    assert!(deleted.unwrap());
    assert!(refreshed.unwrap());
    assert!(!manager.contains(&seeded.id));
    assert!(manager.views().is_empty());
}
