//! Resource Fetcher
//!
//! Calls the URLs a [`BoundAdapter`] resolves. List and Search responses are
//! paginated with `pageToken`/`nextPageToken`; nothing is retried.

use super::adapter::ResourceTypeId;
use super::endpoint::{BoundAdapter, Operation};
use super::registry::Catalog;
use super::scope::ScopeParams;
use crate::gcp::client::GcpClient;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Upper bound on pages followed for one collection
const MAX_PAGES: usize = 100;

/// Types enumerated at once by [`fetch_offerable`]
const MAX_CONCURRENT_TYPES: usize = 8;

/// Every item returned by one List or Search
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub type_id: ResourceTypeId,
    pub operation: Operation,
    pub items: Vec<Value>,
}

/// Fetch a single resource by its composite query
pub async fn fetch_item(client: &GcpClient, bound: &BoundAdapter, query: &str) -> Result<Value> {
    let url = bound.get_url(query)?;
    client
        .get(&url)
        .await
        .with_context(|| format!("Failed to get {} {}", bound.type_id, query))
}

/// Enumerate a type (List, or Search scoped by `anchor`), following every page
pub async fn fetch_collection(
    client: &GcpClient,
    bound: &BoundAdapter,
    anchor: Option<&str>,
) -> Result<Collection> {
    let enumeration = bound.enumeration(anchor)?;
    let items = fetch_pages(client, enumeration.url(), &bound.list_response_key)
        .await
        .with_context(|| format!("Failed to {} {}", enumeration.operation(), bound.type_id))?;

    tracing::debug!(
        "{} {}: {} items",
        enumeration.operation(),
        bound.type_id,
        items.len()
    );

    Ok(Collection {
        type_id: bound.type_id.clone(),
        operation: enumeration.operation(),
        items,
    })
}

async fn fetch_pages(client: &GcpClient, base: &str, response_key: &str) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let mut url = Url::parse(base).with_context(|| format!("Invalid URL {}", base))?;
        if let Some(token) = &page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }

        let response = client.get(url.as_str()).await?;
        if let Some(items) = response.get(response_key).and_then(Value::as_array) {
            all_items.extend(items.iter().cloned());
        }

        page_token = response
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if page_token.is_none() {
            return Ok(all_items);
        }
    }

    tracing::warn!("Stopped after {} pages of {}", MAX_PAGES, base);
    Ok(all_items)
}

/// Enumerate every offerable type concurrently
///
/// Types that cannot be bound to `params` or enumerated without an anchor are
/// skipped with a log line, as are types whose fetch fails. Results are
/// sorted by type id.
pub async fn fetch_offerable(
    client: &GcpClient,
    catalog: &Catalog,
    params: &ScopeParams,
    anchor: Option<&str>,
) -> Vec<Collection> {
    let mut bound = Vec::new();
    for type_id in catalog.offerable_types() {
        match catalog.bind(type_id.as_str(), params) {
            Ok(adapter) => bound.push(adapter),
            Err(e) => tracing::warn!("Skipping {}: {}", type_id, e),
        }
    }

    let mut collections: Vec<Collection> = stream::iter(bound.iter())
        .map(|adapter| async move {
            match fetch_collection(client, adapter, anchor).await {
                Ok(collection) => Some(collection),
                Err(e) => {
                    match e.downcast_ref::<crate::error::Error>() {
                        Some(err) if err.is_skippable() => tracing::debug!("Skipping {}: {}", adapter.type_id, err),
                        _ => tracing::warn!("Skipping {}: {:#}", adapter.type_id, e),
                    }
                    None
                },
            }
        })
        .buffer_unordered(MAX_CONCURRENT_TYPES)
        .filter_map(|collection| async move { collection })
        .collect()
        .await;

    collections.sort_by(|a, b| a.type_id.cmp(&b.type_id));
    collections
}
