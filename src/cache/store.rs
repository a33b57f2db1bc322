//! Path Metadata Store
//!
//! Map from normalized absolute path to cached metadata and cached child
//! listing. Every insertion or removal also patches the parent's listing,
//! so a listed name always has an entry of its own.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::fs::path::{is_descendant, pathjoin, pathsplit};
use crate::remote::Metadata;

/// Cached state of one path
///
/// `metadata` is `None` until fetched. `children` is `None` until the
/// listing is fetched, which is different from an empty folder.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub metadata: Option<Metadata>,
    pub children: Option<Vec<String>>,
    /// When this entry was last confirmed fresh
    timestamp: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(metadata: Option<Metadata>, children: Option<Vec<String>>, ttl: Duration) -> Self {
        Self {
            metadata,
            children,
            timestamp: Instant::now(),
            ttl,
        }
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Whether the entry is older than its TTL
    pub fn expired(&self) -> bool {
        self.timestamp.elapsed() > self.ttl
    }

    /// Mark the entry fresh without refetching
    pub fn renew(&mut self) {
        self.timestamp = Instant::now();
    }

    /// Directory flag from cached metadata, if known
    pub fn is_dir(&self) -> Option<bool> {
        self.metadata.as_ref().map(|meta| meta.is_dir)
    }

    fn add_child(&mut self, name: &str) {
        if let Some(children) = self.children.as_mut() {
            if !children.iter().any(|child| child == name) {
                children.push(name.to_string());
            }
        }
    }

    fn del_child(&mut self, name: &str) {
        if let Some(children) = self.children.as_mut() {
            children.retain(|child| child != name);
        }
    }
}

/// In-memory store of path metadata
///
/// Expiry is checked lazily by callers; nothing is evicted in the
/// background.
pub struct PathMetadataStore {
    entries: BTreeMap<String, CacheEntry>,
    ttl: Duration,
}

impl PathMetadataStore {
    /// Create an empty store whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, path: &str) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(path)
    }

    /// Store fresh metadata for a path, dropping any cached listing
    ///
    /// The name is added to the parent's listing when the parent has one.
    pub fn set(&mut self, path: &str, metadata: Metadata) {
        self.insert(path, CacheEntry::new(Some(metadata), None, self.ttl));
    }

    /// Store fresh metadata together with the folder's listing
    pub fn set_listing(&mut self, path: &str, metadata: Metadata, children: Vec<String>) {
        debug!(path = path, entries = children.len(), "Cached directory listing");
        self.insert(path, CacheEntry::new(Some(metadata), Some(children), self.ttl));
    }

    fn insert(&mut self, path: &str, entry: CacheEntry) {
        self.entries.insert(path.to_string(), entry);
        trace!(path = path, "Cached metadata");

        if path == "/" {
            return;
        }
        let (parent, name) = pathsplit(path);
        if let Some(parent_entry) = self.entries.get_mut(parent) {
            parent_entry.add_child(name);
        }
    }

    /// Remove a path's entry and every cached entry below it
    ///
    /// The name is dropped from the parent's listing. Removing an unknown
    /// path returns `None` and changes nothing.
    pub fn remove(&mut self, path: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(path)?;

        let before = self.entries.len();
        self.entries.retain(|key, _| !is_descendant(key, path));
        debug!(
            path = path,
            descendants = before - self.entries.len(),
            "Invalidated cache for path"
        );

        if path != "/" {
            let (parent, name) = pathsplit(path);
            if let Some(parent_entry) = self.entries.get_mut(parent) {
                parent_entry.del_child(name);
            }
        }
        Some(entry)
    }

    /// Forget a folder's cached listing while keeping its metadata
    pub fn invalidate_children(&mut self, path: &str) {
        if let Some(entry) = self.entries.get_mut(path) {
            if entry.children.take().is_some() {
                debug!(path = path, "Invalidated directory listing");
            }
        }
    }

    /// Drop cached direct children of `path` whose names are not in `keep`
    ///
    /// Covers entries cached outside any listing, such as a single
    /// `metadata` lookup or an upload after the listing was invalidated.
    pub fn prune_children(&mut self, path: &str, keep: &[String]) {
        let stale: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.as_str() != "/" && pathsplit(key).0 == path)
            .filter(|key| !keep.iter().any(|name| name == pathsplit(key).1))
            .cloned()
            .collect();
        for key in stale {
            debug!(path = %key, "Dropping member missing from listing");
            self.remove(&key);
        }
    }

    /// Child paths of a cached listing, if present
    pub fn child_paths(&self, path: &str) -> Option<Vec<String>> {
        let children = self.entries.get(path)?.children.as_ref()?;
        Some(children.iter().map(|name| pathjoin(path, name)).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        debug!("Cleared metadata store");
    }
}
