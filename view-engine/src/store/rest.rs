//! HTTP client for the saved views REST endpoint
//!
//! `{base}/api/saved_views/` for the collection, `{base}/api/saved_views/{id}/`
//! for single views. List responses may be a bare array or a paginated
//! `{ "results": [...], "next": ... }` body; pages are followed.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use view_types::{View, ViewPayload, ViewRecord, ViewScope};

use super::ViewStore;
use crate::error::StoreError;

const SAVED_VIEWS_PATH: &str = "/api/saved_views/";
/// Upper bound on followed pages, in case a server loops `next`
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Page {
        results: Vec<ViewRecord>,
        #[serde(default)]
        next: Option<String>,
    },
    Plain(Vec<ViewRecord>),
}

/// `ViewStore` over HTTP + JSON
#[derive(Debug, Clone)]
pub struct RestViewStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestViewStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unexpected(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self) -> String {
        format!("{}{}", self.base_url, SAVED_VIEWS_PATH)
    }

    fn item_url(&self, id: i64) -> String {
        format!("{}{}{}/", self.base_url, SAVED_VIEWS_PATH, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorize(request).send().await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(describe_http_error(response).await)
        }
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> Result<T, StoreError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| StoreError::Unexpected(format!("Failed to parse JSON: {e}")))
    }
}

/// Map a non-success response to the error taxonomy
async fn describe_http_error(response: Response) -> StoreError {
    let status = response.status();
    let url = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body).unwrap_or_else(|| format!("HTTP error: {status}"));

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(format!("{url}: {detail}")),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Forbidden(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Validation(detail),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            StoreError::Unavailable(detail)
        }
        _ => StoreError::Unexpected(detail),
    }
}

/// Pull a human-readable message out of an error body
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return Some(body.to_string());
    };
    for key in ["detail", "error", "message"] {
        if let Some(message) = json.get(key).and_then(|v| v.as_str()) {
            return Some(message.to_string());
        }
    }
    // field errors: {"name": ["This field may not be blank."]}
    if let Some(fields) = json.as_object() {
        let messages: Vec<String> = fields
            .iter()
            .map(|(field, errors)| match errors {
                serde_json::Value::Array(items) => {
                    let joined: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
                    format!("{field}: {}", joined.join(" "))
                }
                other => format!("{field}: {other}"),
            })
            .collect();
        if !messages.is_empty() {
            return Some(messages.join("; "));
        }
    }
    Some(body.to_string())
}

#[async_trait]
impl ViewStore for RestViewStore {
    async fn list_views(&self, scope: ViewScope) -> Result<Vec<View>, StoreError> {
        let mut request = self.client.get(self.collection_url());
        if let Some(scope) = scope.as_query() {
            request = request.query(&[("scope", scope)]);
        }

        let mut views = Vec::new();
        for _ in 0..MAX_PAGES {
            match self.send_json::<ListResponse>(request).await? {
                ListResponse::Plain(records) => {
                    views.extend(records.into_iter().map(View::from));
                    return Ok(views);
                }
                ListResponse::Page { results, next } => {
                    views.extend(results.into_iter().map(View::from));
                    match next {
                        Some(next) => request = self.client.get(next),
                        None => return Ok(views),
                    }
                }
            }
        }
        tracing::warn!(pages = MAX_PAGES, "Stopped following saved view pages");
        Ok(views)
    }

    async fn get_view(&self, id: i64) -> Result<View, StoreError> {
        let record: ViewRecord = self.send_json(self.client.get(self.item_url(id))).await?;
        Ok(record.into())
    }

    async fn create_view(&self, payload: &ViewPayload) -> Result<View, StoreError> {
        let record: ViewRecord = self
            .send_json(self.client.post(self.collection_url()).json(payload))
            .await?;
        tracing::info!(view_id = record.id, name = %record.name, "Created saved view");
        Ok(record.into())
    }

    async fn update_view(&self, id: i64, payload: &ViewPayload) -> Result<View, StoreError> {
        let record: ViewRecord = self
            .send_json(self.client.patch(self.item_url(id)).json(payload))
            .await?;
        tracing::info!(view_id = id, "Updated saved view");
        Ok(record.into())
    }

    async fn delete_view(&self, id: i64) -> Result<(), StoreError> {
        self.send(self.client.delete(self.item_url(id))).await?;
        tracing::info!(view_id = id, "Deleted saved view");
        Ok(())
    }
}
