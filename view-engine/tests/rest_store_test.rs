//! REST view store integration tests
//!
//! Runs `RestViewStore` against an in-process axum server that behaves like
//! the saved views endpoint: paginated lists, field validation, 404s.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use view_engine::{
    ChangeNotifier, DraftManager, MemoryLocalStore, RestViewStore, SaveOutcome, StoreError, ViewStore,
};
use view_types::{FieldKey, SortSpec, View, ViewConfig, ViewId, ViewPayload, ViewScope};

#[derive(Clone)]
struct FakeApi {
    views: Arc<Mutex<BTreeMap<i64, Value>>>,
    next_id: Arc<AtomicI64>,
    page_size: usize,
    base_url: Arc<Mutex<String>>,
    seen_auth: Arc<Mutex<Vec<String>>>,
    seen_scopes: Arc<Mutex<Vec<String>>>,
}

impl FakeApi {
    fn new(page_size: usize) -> Self {
        Self {
            views: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
            page_size,
            base_url: Arc::new(Mutex::new(String::new())),
            seen_auth: Arc::new(Mutex::new(Vec::new())),
            seen_scopes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn record_auth(&self, headers: &HeaderMap) {
        if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.seen_auth.lock().unwrap().push(value.to_string());
        }
    }
}

async fn list_views(
    State(api): State<FakeApi>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    api.record_auth(&headers);
    if let Some(scope) = params.get("scope") {
        api.seen_scopes.lock().unwrap().push(scope.clone());
    }
    let views: Vec<Value> = api.views.lock().unwrap().values().cloned().collect();
    if api.page_size == 0 {
        return Json(Value::Array(views));
    }

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let start = (page - 1) * api.page_size;
    let end = (start + api.page_size).min(views.len());
    let next = (end < views.len()).then(|| {
        format!(
            "{}/api/saved_views/?page={}",
            api.base_url.lock().unwrap(),
            page + 1
        )
    });
    Json(json!({
        "count": views.len(),
        "next": next,
        "previous": null,
        "results": views[start.min(end)..end],
    }))
}

async fn create_view(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    api.record_auth(&headers);
    let name = body.get("name").and_then(|n| n.as_str()).unwrap_or_default();
    if name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"name": ["This field may not be blank."]})),
        );
    }
    let id = api.next_id.fetch_add(1, Ordering::SeqCst);
    body["id"] = json!(id);
    body["owner"] = json!("alice");
    body["created"] = json!("2026-01-05T09:00:00Z");
    body["modified"] = json!("2026-01-05T09:00:00Z");
    api.views.lock().unwrap().insert(id, body.clone());
    (StatusCode::CREATED, Json(body))
}

async fn get_view(State(api): State<FakeApi>, Path(id): Path<i64>) -> (StatusCode, Json<Value>) {
    match api.views.lock().unwrap().get(&id) {
        Some(view) => (StatusCode::OK, Json(view.clone())),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))),
    }
}

async fn update_view(
    State(api): State<FakeApi>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut views = api.views.lock().unwrap();
    let Some(existing) = views.get_mut(&id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."})));
    };
    if let (Some(target), Some(fields)) = (existing.as_object_mut(), body.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    existing["modified"] = json!("2026-01-06T10:30:00Z");
    (StatusCode::OK, Json(existing.clone()))
}

async fn delete_view(State(api): State<FakeApi>, Path(id): Path<i64>) -> StatusCode {
    match api.views.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Test server failed");
    });
    format!("http://{addr}")
}

async fn setup(page_size: usize) -> (RestViewStore, FakeApi) {
    let api = FakeApi::new(page_size);
    let router = Router::new()
        .route("/api/saved_views/", get(list_views).post(create_view))
        .route(
            "/api/saved_views/{id}/",
            get(get_view).patch(update_view).delete(delete_view),
        )
        .with_state(api.clone());
    let base_url = spawn_server(router).await;
    *api.base_url.lock().unwrap() = base_url.clone();

    let store = RestViewStore::new(base_url, Some("secret-token".to_string()), Duration::from_secs(5))
        .expect("Failed to build store");
    (store, api)
}

fn sample_view(name: &str) -> View {
    let mut config = ViewConfig {
        column_order: vec!["title".into(), FieldKey::Custom(4)],
        sorting: Some(SortSpec::new("created", true)),
        ..ViewConfig::default()
    };
    config.column_sizing.insert(FieldKey::Custom(4), 120);
    View::new_draft(name, config)
}

#[tokio::test]
async fn test_create_get_update_delete_cycle() {
    let (store, api) = setup(0).await;

    let created = store.create_view(&ViewPayload::from(&sample_view("Mine"))).await.unwrap();
    assert_eq!(created.id, ViewId::Durable(1));
    assert_eq!(created.owner.as_deref(), Some("alice"));
    assert_eq!(created.config.column_sizing.get(&FieldKey::Custom(4)), Some(&120));
    assert_eq!(created.config.sorting, Some(SortSpec::new("created", true)));

    let mut renamed = created.clone();
    renamed.name = "Mine (v2)".to_string();
    let updated = store.update_view(1, &ViewPayload::from(&renamed)).await.unwrap();
    assert_eq!(updated.name, "Mine (v2)");
    assert_ne!(updated.modified, created.modified);

    assert_eq!(store.get_view(1).await.unwrap().name, "Mine (v2)");
    store.delete_view(1).await.unwrap();
    let err = store.get_view(1).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(ref detail) if detail.contains("Not found.")));

    let auth = api.seen_auth.lock().unwrap().clone();
    assert!(auth.iter().all(|value| value == "Bearer secret-token"));
    assert!(!auth.is_empty());
}

#[tokio::test]
async fn test_list_follows_pages_and_sends_scope() {
    let (store, api) = setup(2).await;
    for name in ["One", "Two", "Three", "Four", "Five"] {
        store.create_view(&ViewPayload::from(&sample_view(name))).await.unwrap();
    }

    let views = store.list_views(ViewScope::All).await.unwrap();
    let names: Vec<&str> = views.iter().map(|view| view.name.as_str()).collect();
    assert_eq!(names, vec!["One", "Two", "Three", "Four", "Five"]);

    store.list_views(ViewScope::Global).await.unwrap();
    assert_eq!(api.seen_scopes.lock().unwrap().clone(), vec!["global".to_string()]);
}

#[tokio::test]
async fn test_blank_name_maps_to_validation() {
    let (store, _api) = setup(0).await;
    let mut view = sample_view("x");
    view.name = String::new();

    let err = store.create_view(&ViewPayload::from(&view)).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::Validation("name: This field may not be blank.".to_string())
    );
    assert!(!err.is_endpoint_unavailable());
}

#[tokio::test]
async fn test_missing_endpoint_is_unavailable() {
    let base_url = spawn_server(Router::new()).await;
    let store = RestViewStore::new(base_url, None, Duration::from_secs(5)).unwrap();

    let err = store.list_views(ViewScope::All).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(err.is_endpoint_unavailable());
}

#[tokio::test]
async fn test_unreachable_server_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let store = RestViewStore::new(format!("http://{addr}"), None, Duration::from_secs(2)).unwrap();
    let err = store.get_view(1).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn test_draft_promotion_over_http() {
    let (store, _api) = setup(0).await;
    let notifier = ChangeNotifier::new(Arc::new(MemoryLocalStore::new()));
    let manager = DraftManager::new(Arc::new(store), notifier, true);

    let created = manager.create_draft(sample_view("Over the wire"));
    let outcome = created.persist.unwrap().await.unwrap().unwrap();
    let SaveOutcome::Persisted(view) = outcome else {
        panic!("expected the create to reach the server");
    };
    assert_eq!(view.id, ViewId::Durable(1));
    assert!(manager.get(&created.id).is_none());
    assert_eq!(manager.views(), vec![view]);
}
