//! Caching Client
//!
//! Wraps a `RemoteApi` with the path metadata store. Reads consult the
//! store first and only go remote on a miss or expiry; a "not modified"
//! listing reply renews the cached entry instead of refetching. Every
//! mutation updates or invalidates the affected entries, and remote
//! failures are resolved into `FsError` kinds here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, trace, warn};

use super::store::PathMetadataStore;
use crate::config::CacheConfig;
use crate::fs::errors::{FsError, FsResult};
use crate::fs::path::{dirname, pathjoin};
use crate::remote::{Download, Metadata, MetadataRequest, RemoteApi, RemoteError, UploadBody};

/// Marker in the body of a delete rejected for a non-empty folder
const NOT_EMPTY_MARKER: &str = "must not be empty";

/// Build the connection error surfaced for an unclassified remote failure
fn connection_error(op: &'static str, path: &str, err: &RemoteError) -> FsError {
    warn!(op = op, path = path, status = ?err.status(), error = %err, "Remote operation failed");
    FsError::RemoteConnection {
        op,
        path: path.to_string(),
        status: err.status(),
    }
}

/// Remote client with a metadata cache in front of it
///
/// Clones share the remote, the store and the counters. Each call holds
/// the store lock for its whole duration, so a check-then-populate
/// sequence is atomic with respect to other callers.
pub struct CachingClient<R> {
    remote: Arc<R>,
    store: Arc<Mutex<PathMetadataStore>>,
    config: CacheConfig,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl<R> Clone for CachingClient<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            store: Arc::clone(&self.store),
            config: self.config,
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
        }
    }
}

impl<R: RemoteApi> CachingClient<R> {
    /// Wrap a remote client with an empty cache
    pub fn new(remote: R, config: CacheConfig) -> Self {
        Self {
            remote: Arc::new(remote),
            store: Arc::new(Mutex::new(PathMetadataStore::new(config.ttl))),
            config,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Lock the store for the duration of one call
    pub fn store(&self) -> MutexGuard<'_, PathMetadataStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Metadata for a path
    ///
    /// Returns a copy of the cached record while it is fresh, otherwise
    /// fetches it without a listing and caches the result.
    pub fn metadata(&self, path: &str) -> FsResult<Metadata> {
        let mut store = self.store();

        if let Some(entry) = store.get(path) {
            if let (Some(metadata), false) = (&entry.metadata, entry.expired()) {
                self.hit();
                trace!(path = path, "Cache HIT for metadata");
                return Ok(metadata.clone());
            }
        }
        self.miss();
        trace!(path = path, "Cache MISS for metadata");

        let request = MetadataRequest {
            include_deleted: false,
            list: false,
            hash: None,
        };
        let metadata = match self.remote.fetch_metadata(path, request) {
            Ok(metadata) => metadata,
            Err(RemoteError::NotFound) => {
                store.remove(path);
                return Err(FsError::not_found(path));
            }
            Err(e) => return Err(connection_error("metadata", path, &e)),
        };

        if metadata.is_deleted {
            store.remove(path);
            return Err(FsError::not_found(path));
        }

        store.set(path, metadata.clone());
        Ok(metadata)
    }

    /// Names of a folder's members
    ///
    /// A fresh cached listing is returned as is. Otherwise the listing is
    /// fetched, passing the cached version tag when a previous listing
    /// exists so the remote can answer "not modified".
    pub fn children(&self, path: &str) -> FsResult<Vec<String>> {
        let mut store = self.store();
        let mut hash = None;

        if let Some(entry) = store.get(path) {
            if !entry.expired() {
                if let Some(children) = &entry.children {
                    self.hit();
                    trace!(path = path, entries = children.len(), "Cache HIT for directory");
                    return Ok(children.clone());
                }
                if entry.is_dir() == Some(false) {
                    return Err(FsError::ResourceInvalid {
                        path: path.to_string(),
                    });
                }
            }
            if entry.children.is_some() {
                hash = entry.metadata.as_ref().and_then(|meta| meta.hash.clone());
            }
        }
        self.miss();
        trace!(path = path, hash = ?hash, "Cache MISS for directory");

        let request = MetadataRequest {
            include_deleted: false,
            list: true,
            hash: hash.as_deref(),
        };
        let mut metadata = match self.remote.fetch_metadata(path, request) {
            Ok(metadata) => metadata,
            Err(RemoteError::NotModified) => {
                return match store.get_mut(path) {
                    Some(entry) if entry.children.is_some() => {
                        entry.renew();
                        debug!(path = path, "Directory not modified, renewed cache entry");
                        Ok(entry.children.clone().unwrap_or_default())
                    }
                    _ => Err(connection_error("children", path, &RemoteError::NotModified)),
                };
            }
            Err(RemoteError::NotFound) => {
                store.remove(path);
                return Err(FsError::not_found(path));
            }
            Err(e) => return Err(connection_error("children", path, &e)),
        };

        if metadata.is_deleted {
            store.remove(path);
            return Err(FsError::not_found(path));
        }
        if !metadata.is_dir {
            store.set(path, metadata);
            return Err(FsError::ResourceInvalid {
                path: path.to_string(),
            });
        }

        let members: Vec<Metadata> = metadata
            .take_contents()
            .into_iter()
            .filter(|member| !member.is_deleted && !member.base_name().is_empty())
            .collect();
        let children: Vec<String> = members
            .iter()
            .map(|member| member.base_name().to_string())
            .collect();

        // Anything cached under the folder but absent from the listing is gone
        store.prune_children(path, &children);

        store.set_listing(path, metadata, children.clone());
        for member in members {
            let child_path = pathjoin(path, member.base_name());
            store.set(&child_path, member);
        }

        Ok(children)
    }

    /// Create a folder and cache it as an empty listing
    pub fn file_create_folder(&self, path: &str) -> FsResult<Metadata> {
        let mut store = self.store();

        let metadata = self.remote.create_directory(path).map_err(|e| match e {
            RemoteError::NotFound => FsError::ParentDirectoryMissing {
                path: path.to_string(),
            },
            e if e.status() == Some(403) => FsError::DestinationExists {
                path: path.to_string(),
            },
            e => connection_error("file_create_folder", path, &e),
        })?;

        info!(path = path, "Created folder");
        store.set_listing(path, metadata.clone(), Vec::new());
        Ok(metadata)
    }

    /// Copy a file or folder and cache the destination
    pub fn file_copy(&self, src: &str, dst: &str) -> FsResult<Metadata> {
        let mut store = self.store();

        let metadata = self
            .remote
            .copy(src, dst)
            .map_err(|e| Self::map_transfer_error("file_copy", src, dst, e))?;

        info!(src = src, dst = dst, "Copied");
        store.set(dst, metadata.clone());
        Ok(metadata)
    }

    /// Move a file or folder, moving its cache entry along
    pub fn file_move(&self, src: &str, dst: &str) -> FsResult<Metadata> {
        let mut store = self.store();

        let metadata = self
            .remote
            .move_entry(src, dst)
            .map_err(|e| Self::map_transfer_error("file_move", src, dst, e))?;

        info!(src = src, dst = dst, "Moved");
        store.remove(src);
        store.set(dst, metadata.clone());
        Ok(metadata)
    }

    fn map_transfer_error(op: &'static str, src: &str, dst: &str, err: RemoteError) -> FsError {
        match err {
            RemoteError::NotFound => FsError::not_found(src),
            e if e.status() == Some(403) => FsError::DestinationExists {
                path: dst.to_string(),
            },
            e => connection_error(op, src, &e),
        }
    }

    /// Delete a file or folder and drop its cache entries
    pub fn file_delete(&self, path: &str) -> FsResult<()> {
        let mut store = self.store();

        match self.remote.delete(path) {
            Ok(_) => {}
            Err(RemoteError::NotFound) => {
                store.remove(path);
                return Err(FsError::not_found(path));
            }
            Err(e) if e.status() == Some(400) && e.body().contains(NOT_EMPTY_MARKER) => {
                return Err(FsError::DirectoryNotEmpty {
                    path: path.to_string(),
                });
            }
            Err(e) => return Err(connection_error("file_delete", path, &e)),
        }

        info!(path = path, "Deleted");
        store.remove(path);
        Ok(())
    }

    /// Upload a body to `path`
    ///
    /// The parent's cached listing is invalidated since the remote does
    /// not return the updated listing.
    pub fn put_file(&self, path: &str, body: UploadBody, overwrite: bool) -> FsResult<Metadata> {
        let mut store = self.store();

        let metadata = self
            .remote
            .upload(path, body, overwrite)
            .map_err(|e| connection_error("put_file", path, &e))?;

        store.invalidate_children(dirname(path));
        store.set(path, metadata.clone());
        Ok(metadata)
    }

    /// Open a streamed download; content is never cached
    pub fn get_file(&self, path: &str) -> FsResult<Download> {
        self.remote.download(path).map_err(|e| match e {
            RemoteError::NotFound => FsError::not_found(path),
            e => connection_error("get_file", path, &e),
        })
    }

    /// Drop every cached entry and reset counters
    pub fn clear_cache(&self) {
        self.store().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Get cache statistics
    ///
    /// Returns (hits, misses, hit_rate)
    pub fn stats(&self) -> (u64, u64, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        (hits, misses, hit_rate)
    }

    /// Log current cache metrics
    pub fn log_metrics(&self) {
        let (hits, misses, hit_rate) = self.stats();
        let entries = self.store().len();

        debug!(
            hits = hits,
            misses = misses,
            hit_rate = format!("{:.1}%", hit_rate),
            entries = entries,
            "Cache metrics"
        );
    }
}
