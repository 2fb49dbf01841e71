//! Public resources API client: metadata, download links and byte streams

use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use super::types::{
    last_segment, ApiDownloadLink, ApiItem, ApiResource, DiskResult, ResourceItem, ResourceNode,
    UpstreamError,
};
use crate::config::BuildConfig;

/// Upper bound for the up-front buffer reservation when the server announces a length
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct DiskClient {
    http: Client,
    base_url: String,
    page_size: u32,
}

impl DiskClient {
    pub fn new(config: &BuildConfig) -> DiskResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            page_size: config.listing_page_size,
        })
    }

    /// Resolve one node of the share. One request per call, nothing memoized.
    pub async fn resolve(&self, public_key: &str, path: &str) -> DiskResult<ResourceNode> {
        let resource = self.fetch_resource(public_key, path).await?;

        let node_path = resource
            .path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| path.to_string());
        let name = if resource.name.is_empty() {
            last_segment(&node_path).to_string()
        } else {
            resource.name
        };

        let children = match resource.embedded {
            Some(embedded) => {
                let listed = embedded.items.len();
                let children: Vec<String> = embedded
                    .items
                    .into_iter()
                    .filter_map(|item| item.path.filter(|p| !p.is_empty()))
                    .collect();
                if children.len() < listed {
                    debug!(
                        "resolve_items_without_path: path={} skipped={}",
                        node_path,
                        listed - children.len()
                    );
                }
                if let Some(total) = embedded.total {
                    if total > listed as u64 {
                        warn!(
                            "resolve_listing_truncated: path={} listed={} total={}",
                            node_path, listed, total
                        );
                    }
                }
                children
            }
            None => Vec::new(),
        };

        Ok(ResourceNode {
            name,
            kind: resource.kind,
            path: node_path,
            children,
        })
    }

    /// Immediate items of a folder, for browsing. A file path yields an empty listing.
    pub async fn list(&self, public_key: &str, path: &str) -> DiskResult<Vec<ResourceItem>> {
        let resource = self.fetch_resource(public_key, path).await?;
        Ok(resource
            .embedded
            .map(|embedded| {
                embedded
                    .items
                    .into_iter()
                    .filter_map(ApiItem::into_resource_item)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Time-limited direct URL for a file. `None` when the provider returns no `href`.
    pub async fn download_link(&self, public_key: &str, path: &str) -> DiskResult<Option<String>> {
        check_public_key(public_key)?;
        let url = format!(
            "{}/download?public_key={}&path={}",
            self.base_url,
            urlencoding::encode(public_key),
            urlencoding::encode(path)
        );
        let link: ApiDownloadLink = self.get_json(&url).await?;
        Ok(link.href.filter(|href| !href.is_empty()))
    }

    /// Stream the body behind a download href into memory
    pub async fn fetch_bytes(&self, href: &str, cancel: &CancellationToken) -> DiskResult<Vec<u8>> {
        let response = self.send(href).await?;

        let expected = response.content_length().unwrap_or(0);
        let mut buffer = Vec::with_capacity(expected.min(MAX_PREALLOCATION) as usize);
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(UpstreamError::Cancelled);
            }
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);
        }

        if expected > 0 && buffer.len() as u64 != expected {
            return Err(UpstreamError::Malformed {
                url: href.to_string(),
                reason: format!("expected {} bytes, received {}", expected, buffer.len()),
            });
        }

        Ok(buffer)
    }

    async fn fetch_resource(&self, public_key: &str, path: &str) -> DiskResult<ApiResource> {
        check_public_key(public_key)?;
        let mut url = format!(
            "{}?public_key={}&limit={}",
            self.base_url,
            urlencoding::encode(public_key),
            self.page_size
        );
        if !path.is_empty() {
            url.push_str("&path=");
            url.push_str(&urlencoding::encode(path));
        }
        self.get_json(&url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> DiskResult<T> {
        let response = self.send(url).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| UpstreamError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn send(&self, url: &str) -> DiskResult<Response> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            debug!("upstream_status: status={} body={}", status, text);
            return Err(UpstreamError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

fn check_public_key(public_key: &str) -> DiskResult<()> {
    if public_key.trim().is_empty() {
        return Err(UpstreamError::InvalidInput(
            "public key must not be empty".to_string(),
        ));
    }
    Ok(())
}
