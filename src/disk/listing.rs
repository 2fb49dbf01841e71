//! Folder browsing with a TTL cache keyed by (public key, path)

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::debug;

use super::client::DiskClient;
use super::filter::FileFilter;
use super::types::{DiskResult, ResourceItem};
use crate::config::DEFAULT_LISTING_TTL;

struct CachedListing {
    fetched_at: Instant,
    items: Vec<ResourceItem>,
}

/// Unfiltered folder listings, shared by every caller holding the same cache
pub struct ListingCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), CachedListing>>,
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new(DEFAULT_LISTING_TTL)
    }
}

impl ListingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, public_key: &str, path: &str) -> Option<Vec<ResourceItem>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let key = (public_key.to_string(), path.to_string());
        match entries.get(&key) {
            Some(cached) if cached.fetched_at.elapsed() < self.ttl => Some(cached.items.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a listing; expired listings of any key are dropped on the way
    pub fn insert(&self, public_key: &str, path: &str, items: Vec<ResourceItem>) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, cached| cached.fetched_at.elapsed() < self.ttl);
        entries.insert(
            (public_key.to_string(), path.to_string()),
            CachedListing {
                fetched_at: Instant::now(),
                items,
            },
        );
    }

    pub fn invalidate(&self, public_key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|(key, _), _| key != public_key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// List a folder of the share, serving repeated requests from the cache.
/// Filtering happens after the cache so every filter shares one upstream listing.
pub async fn list_folder(
    client: &DiskClient,
    cache: &ListingCache,
    public_key: &str,
    path: &str,
    filter: FileFilter,
) -> DiskResult<Vec<ResourceItem>> {
    let items = match cache.get(public_key, path) {
        Some(items) => {
            debug!("listing_cache_hit: path={} items={}", path, items.len());
            items
        }
        None => {
            let items = client.list(public_key, path).await?;
            debug!("listing_fetched: path={} items={}", path, items.len());
            cache.insert(public_key, path, items.clone());
            items
        }
    };

    Ok(filter.apply(items))
}
