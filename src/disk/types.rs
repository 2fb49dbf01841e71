//! Provider payloads, resolved resource types and upstream errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type DiskResult<T> = Result<T, UpstreamError>;

/// Failure of a single outbound call to the provider or to a download href
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("Cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Directory,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::File => write!(f, "file"),
            ResourceKind::Directory => write!(f, "dir"),
        }
    }
}

/// Resolved metadata for one path of a public share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    pub name: String,
    pub kind: ResourceKind,
    pub path: String,
    /// Immediate children in listing order; always empty for files
    pub children: Vec<String>,
}

impl ResourceNode {
    pub fn is_dir(&self) -> bool {
        self.kind == ResourceKind::Directory
    }
}

/// One row of a folder listing, as shown to a user browsing the share
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceItem {
    pub name: String,
    pub path: String,
    pub kind: ResourceKind,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
}

// ============ Wire payloads ============

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiResource {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "_embedded", default)]
    pub embedded: Option<ApiEmbedded>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiEmbedded {
    #[serde(default)]
    pub items: Vec<ApiItem>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiItem {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<ResourceKind>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiDownloadLink {
    #[serde(default)]
    pub href: Option<String>,
}

impl ApiItem {
    /// Convert to a listing row; items without a path or a type cannot be browsed into
    pub(crate) fn into_resource_item(self) -> Option<ResourceItem> {
        let path = self.path?;
        let kind = self.kind?;
        let name = self
            .name
            .unwrap_or_else(|| last_segment(&path).to_string());
        Some(ResourceItem {
            name,
            path,
            kind,
            size: self.size,
            mime_type: self.mime_type,
        })
    }
}

/// Last non-empty segment of a slash-delimited path
pub(crate) fn last_segment(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_payload_keeps_item_order_and_optional_fields() {
        let raw = r#"{
            "type": "dir",
            "name": "docs",
            "path": "/docs",
            "_embedded": {
                "items": [
                    {"type": "file", "name": "b.txt", "path": "/docs/b.txt", "size": 3},
                    {"type": "file", "name": "no-path.txt"},
                    {"type": "dir", "name": "sub", "path": "/docs/sub"}
                ],
                "total": 3
            }
        }"#;

        let resource: ApiResource = serde_json::from_str(raw).unwrap();
        assert_eq!(resource.kind, ResourceKind::Directory);
        let embedded = resource.embedded.unwrap();
        assert_eq!(embedded.total, Some(3));

        let items: Vec<ResourceItem> = embedded
            .items
            .into_iter()
            .filter_map(ApiItem::into_resource_item)
            .collect();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, "/docs/b.txt");
        assert_eq!(items[0].size, Some(3));
        assert_eq!(items[1].kind, ResourceKind::Directory);
    }

    #[test]
    fn file_payload_has_no_embedded_listing() {
        let raw = r#"{"type": "file", "name": "a.txt", "path": "/a.txt", "size": 10}"#;
        let resource: ApiResource = serde_json::from_str(raw).unwrap();
        assert_eq!(resource.kind, ResourceKind::File);
        assert!(resource.embedded.is_none());
    }

    #[test]
    fn last_segment_ignores_trailing_slash() {
        assert_eq!(last_segment("/docs/sub/"), "sub");
        assert_eq!(last_segment("/a.txt"), "a.txt");
        assert_eq!(last_segment(""), "");
    }
}
