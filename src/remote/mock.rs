//! In-memory remote used by tests
//!
//! Keeps a path tree, bumps a per-folder version on every change so
//! listings can answer "not modified", counts calls per operation and
//! can fail the next call of a given operation.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::sync::Mutex;

use super::{Download, Metadata, MetadataRequest, RemoteApi, RemoteError, UploadBody};
use crate::fs::path::{dirname, is_descendant};

pub(crate) const MODIFIED: &str = "Wed, 27 Apr 2011 22:18:51 +0000";

#[derive(Debug, Clone)]
struct Node {
    is_dir: bool,
    data: Vec<u8>,
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    versions: HashMap<String, u64>,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, RemoteError>,
    /// Deleted paths the remote still reports, with their folder flag
    tombstones: BTreeMap<String, bool>,
    /// Full listings served (not counting "not modified" replies)
    listings: usize,
}

impl State {
    fn bump(&mut self, dir: &str) {
        *self.versions.entry(dir.to_string()).or_insert(0) += 1;
    }

    fn record(&self, path: &str) -> Option<Metadata> {
        let node = self.nodes.get(path)?;
        Some(Metadata {
            path: path.to_string(),
            is_dir: node.is_dir,
            is_deleted: false,
            bytes: node.data.len() as u64,
            modified: Some(MODIFIED.to_string()),
            hash: node
                .is_dir
                .then(|| format!("v{}", self.versions.get(path).copied().unwrap_or(0))),
            rev: Some("1".to_string()),
            mime_type: None,
            contents: None,
        })
    }

    fn tombstone(&self, path: &str) -> Option<Metadata> {
        let is_dir = *self.tombstones.get(path)?;
        Some(Metadata {
            path: path.to_string(),
            is_dir,
            is_deleted: true,
            modified: Some(MODIFIED.to_string()),
            ..Metadata::default()
        })
    }

    fn child_paths(&self, dir: &str) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|key| key.as_str() != "/" && dirname(key) == dir)
            .cloned()
            .collect()
    }

    fn subtree(&self, root: &str) -> Vec<(String, Node)> {
        self.nodes
            .iter()
            .filter(|(key, _)| key.as_str() == root || is_descendant(key, root))
            .map(|(key, node)| (key.clone(), node.clone()))
            .collect()
    }

    fn require_parent_dir(&self, path: &str) -> Result<(), RemoteError> {
        match self.nodes.get(dirname(path)) {
            Some(node) if node.is_dir => Ok(()),
            _ => Err(RemoteError::NotFound),
        }
    }

    fn forbid_existing(&self, path: &str) -> Result<(), RemoteError> {
        if self.nodes.contains_key(path) {
            return Err(RemoteError::from_status(403, "destination already exists"));
        }
        Ok(())
    }
}

pub(crate) struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    pub(crate) fn new() -> Self {
        let mut state = State::default();
        state.nodes.insert(
            "/".to_string(),
            Node {
                is_dir: true,
                data: Vec::new(),
            },
        );
        Self {
            state: Mutex::new(state),
        }
    }

    /// Add a folder without counting a call
    pub(crate) fn add_dir(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            path.to_string(),
            Node {
                is_dir: true,
                data: Vec::new(),
            },
        );
        state.bump(dirname(path));
    }

    /// Add a file without counting a call
    pub(crate) fn add_file(&self, path: &str, data: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.nodes.insert(
            path.to_string(),
            Node {
                is_dir: false,
                data: data.to_vec(),
            },
        );
        state.bump(dirname(path));
    }

    /// Report `path` as a deleted record, in lookups and in its parent's listing
    pub(crate) fn add_tombstone(&self, path: &str, is_dir: bool) {
        let mut state = self.state.lock().unwrap();
        state.nodes.remove(path);
        state.tombstones.insert(path.to_string(), is_dir);
        state.bump(dirname(path));
    }

    /// Change a folder's version as if another writer touched it
    pub(crate) fn touch_dir(&self, path: &str) {
        self.state.lock().unwrap().bump(path);
    }

    pub(crate) fn file_data(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.nodes.get(path).map(|node| node.data.clone())
    }

    pub(crate) fn exists(&self, path: &str) -> bool {
        self.state.lock().unwrap().nodes.contains_key(path)
    }

    /// Number of calls made to one operation
    pub(crate) fn calls(&self, op: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.get(op).copied().unwrap_or(0)
    }

    pub(crate) fn listings(&self) -> usize {
        self.state.lock().unwrap().listings
    }

    /// Number of calls made to any operation
    pub(crate) fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.values().sum()
    }

    /// Fail the next call to `op` with `error`
    pub(crate) fn fail_next(&self, op: &'static str, error: RemoteError) {
        self.state.lock().unwrap().failures.insert(op, error);
    }

    fn begin(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, State>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(op).or_insert(0) += 1;
        match state.failures.remove(op) {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

impl RemoteApi for MemoryRemote {
    fn fetch_metadata(
        &self,
        path: &str,
        request: MetadataRequest<'_>,
    ) -> Result<Metadata, RemoteError> {
        let mut state = self.begin("fetch_metadata")?;
        let mut record = match state.record(path) {
            Some(record) => record,
            None => return state.tombstone(path).ok_or(RemoteError::NotFound),
        };

        if record.is_dir && request.list {
            if request.hash.is_some() && request.hash == record.hash.as_deref() {
                return Err(RemoteError::NotModified);
            }
            let mut contents: Vec<Metadata> = state
                .child_paths(path)
                .iter()
                .filter_map(|child| state.record(child))
                .collect();
            contents.extend(
                state
                    .tombstones
                    .keys()
                    .filter(|key| dirname(key) == path)
                    .filter_map(|key| state.tombstone(key)),
            );
            record.contents = Some(contents);
            state.listings += 1;
        }
        Ok(record)
    }

    fn create_directory(&self, path: &str) -> Result<Metadata, RemoteError> {
        let mut state = self.begin("create_directory")?;
        state.require_parent_dir(path)?;
        state.forbid_existing(path)?;
        state.nodes.insert(
            path.to_string(),
            Node {
                is_dir: true,
                data: Vec::new(),
            },
        );
        state.bump(dirname(path));
        state.record(path).ok_or(RemoteError::NotFound)
    }

    fn copy(&self, src: &str, dst: &str) -> Result<Metadata, RemoteError> {
        let mut state = self.begin("copy")?;
        let tree = state.subtree(src);
        if tree.is_empty() {
            return Err(RemoteError::NotFound);
        }
        state.require_parent_dir(dst)?;
        state.forbid_existing(dst)?;
        for (key, node) in tree {
            let target = format!("{}{}", dst, &key[src.len()..]);
            state.nodes.insert(target, node);
        }
        state.bump(dirname(dst));
        state.record(dst).ok_or(RemoteError::NotFound)
    }

    fn move_entry(&self, src: &str, dst: &str) -> Result<Metadata, RemoteError> {
        let mut state = self.begin("move_entry")?;
        let tree = state.subtree(src);
        if tree.is_empty() {
            return Err(RemoteError::NotFound);
        }
        state.require_parent_dir(dst)?;
        state.forbid_existing(dst)?;
        for (key, node) in tree {
            state.nodes.remove(&key);
            let target = format!("{}{}", dst, &key[src.len()..]);
            state.nodes.insert(target, node);
        }
        state.bump(dirname(src));
        state.bump(dirname(dst));
        state.record(dst).ok_or(RemoteError::NotFound)
    }

    fn delete(&self, path: &str) -> Result<Metadata, RemoteError> {
        let mut state = self.begin("delete")?;
        let mut record = state.record(path).ok_or(RemoteError::NotFound)?;
        if record.is_dir && !state.child_paths(path).is_empty() {
            return Err(RemoteError::from_status(
                400,
                r#"{"error": "Directory must not be empty"}"#,
            ));
        }
        state.nodes.remove(path);
        state.bump(dirname(path));
        record.is_deleted = true;
        Ok(record)
    }

    fn upload(
        &self,
        path: &str,
        mut body: UploadBody,
        overwrite: bool,
    ) -> Result<Metadata, RemoteError> {
        let mut data = Vec::new();
        body.read_to_end(&mut data)?;

        let mut state = self.begin("upload")?;
        state.require_parent_dir(path)?;
        if !overwrite && state.nodes.contains_key(path) {
            return Err(RemoteError::from_status(409, "conflict"));
        }
        state
            .nodes
            .insert(path.to_string(), Node { is_dir: false, data });
        state.bump(dirname(path));
        state.record(path).ok_or(RemoteError::NotFound)
    }

    fn download(&self, path: &str) -> Result<Download, RemoteError> {
        let state = self.begin("download")?;
        match state.nodes.get(path) {
            Some(node) if !node.is_dir => Ok(Download {
                content_length: node.data.len() as u64,
                body: Box::new(Cursor::new(node.data.clone())),
            }),
            _ => Err(RemoteError::NotFound),
        }
    }
}
