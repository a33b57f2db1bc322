//! Dropbox Filesystem Implementation
//!
//! Maps the path-based `FileSystem` operations onto the caching client and
//! shapes remote metadata records into `ResourceInfo`.

use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::errors::{FsError, FsResult};
use super::path::{abspath, compile_wildcard, dirname, normpath, pathjoin, relpath};
use super::{
    EntryFilter, FileStream, FileSystem, FsMeta, ListDirOptions, OpenMode, PathStyle,
    ResourceInfo,
};
use crate::cache::CachingClient;
use crate::config::DropboxConfig;
use crate::remote::client::format_path;
use crate::remote::{DropboxClient, Metadata, RemoteApi, UploadBody};
use crate::transfer::{SpooledReader, SpooledWriter};

/// Parse a remote modification time such as "Wed, 27 Apr 2011 22:18:51 +0000"
///
/// Returns UTC wall time, or local wall time when `localtime` is set.
fn parse_modified(modified: &str, localtime: bool) -> Option<NaiveDateTime> {
    match DateTime::parse_from_rfc2822(modified) {
        Ok(time) if localtime => Some(time.with_timezone(&Local).naive_local()),
        Ok(time) => Some(time.naive_utc()),
        Err(e) => {
            warn!(modified = modified, error = %e, "Unparseable modification time");
            None
        }
    }
}

/// Convert a metadata record to a `ResourceInfo`
pub fn metadata_to_info(metadata: &Metadata, localtime: bool) -> ResourceInfo {
    ResourceInfo {
        size: metadata.bytes,
        is_dir: metadata.is_dir,
        is_file: !metadata.is_dir,
        modified_time: metadata
            .modified
            .as_deref()
            .and_then(|modified| parse_modified(modified, localtime)),
    }
}

/// What a Dropbox-backed filesystem supports
const DROPBOX_META: FsMeta = FsMeta {
    thread_safe: true,
    virtual_paths: false,
    read_only: false,
    unicode_paths: true,
    case_insensitive_paths: true,
    network: true,
    atomic_setcontents: false,
    atomic_makedir: true,
    atomic_rename: true,
    mime_type: "virtual/dropbox",
};

/// Normalize a caller-supplied path
fn clean(path: &str) -> String {
    abspath(&normpath(path))
}

/// A filesystem stored in Dropbox
pub struct DropboxFs<R> {
    client: CachingClient<R>,
    /// Report modification times in local time
    localtime: bool,
}

impl<R: RemoteApi + 'static> DropboxFs<R> {
    pub fn new(client: CachingClient<R>, localtime: bool) -> Self {
        Self { client, localtime }
    }

    /// The caching client, for statistics and cache control
    pub fn client(&self) -> &CachingClient<R> {
        &self.client
    }

    fn keep(&self, path: &str, filter: EntryFilter) -> FsResult<bool> {
        match filter {
            EntryFilter::All => Ok(true),
            EntryFilter::DirsOnly => self.isdir(path),
            EntryFilter::FilesOnly => self.isfile(path),
        }
    }

    /// Apply wildcard, kind filter and path style to a listing
    fn listdir_helper(
        &self,
        path: &str,
        names: Vec<String>,
        options: &ListDirOptions,
    ) -> FsResult<Vec<String>> {
        let wildcard = options
            .wildcard
            .as_deref()
            .map(compile_wildcard)
            .transpose()?;

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            if let Some(pattern) = &wildcard {
                if !pattern.is_match(&name) {
                    continue;
                }
            }
            let child = pathjoin(path, &name);
            if !self.keep(&child, options.filter)? {
                continue;
            }
            entries.push(match options.style {
                PathStyle::Name => name,
                PathStyle::Full => relpath(&child).to_string(),
                PathStyle::Absolute => child,
            });
        }
        Ok(entries)
    }
}

impl DropboxFs<DropboxClient> {
    /// Connect to Dropbox with the given configuration
    ///
    /// `runtime` drives the HTTP client; filesystem calls must be made
    /// from outside its worker threads.
    pub fn from_config(config: &DropboxConfig, runtime: Handle) -> anyhow::Result<Self> {
        let remote = DropboxClient::new(config, runtime)?;
        Ok(Self::new(
            CachingClient::new(remote, config.cache),
            config.localtime,
        ))
    }
}

impl<R> fmt::Display for DropboxFs<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<DropboxFs>")
    }
}

impl<R: RemoteApi + 'static> FileSystem for DropboxFs<R> {
    fn meta(&self) -> FsMeta {
        DROPBOX_META
    }

    fn open(&self, path: &str, mode: OpenMode) -> FsResult<Box<dyn FileStream>> {
        let path = clean(path);
        debug!(path = %path, mode = ?mode, "Opening file");
        match mode {
            OpenMode::Read => Ok(Box::new(SpooledReader::open(&self.client, &path)?)),
            OpenMode::Write => Ok(Box::new(SpooledWriter::new(self.client.clone(), &path))),
        }
    }

    fn setcontents(&self, path: &str, data: &[u8]) -> FsResult<()> {
        let path = clean(path);
        self.client
            .put_file(&path, UploadBody::from_bytes(data.to_vec()), true)?;
        Ok(())
    }

    fn getinfo(&self, path: &str) -> FsResult<ResourceInfo> {
        let metadata = self.client.metadata(&clean(path))?;
        Ok(metadata_to_info(&metadata, self.localtime))
    }

    fn listdir(&self, path: &str, options: &ListDirOptions) -> FsResult<Vec<String>> {
        let path = clean(path);
        let names = self.client.children(&path)?;
        self.listdir_helper(&path, names, options)
    }

    fn copy(&self, src: &str, dst: &str) -> FsResult<()> {
        self.client.file_copy(&clean(src), &clean(dst))?;
        Ok(())
    }

    fn copydir(&self, src: &str, dst: &str) -> FsResult<()> {
        self.client.file_copy(&clean(src), &clean(dst))?;
        Ok(())
    }

    fn move_file(&self, src: &str, dst: &str) -> FsResult<()> {
        self.client.file_move(&clean(src), &clean(dst))?;
        Ok(())
    }

    fn movedir(&self, src: &str, dst: &str) -> FsResult<()> {
        self.client.file_move(&clean(src), &clean(dst))?;
        Ok(())
    }

    fn rename(&self, src: &str, dst: &str) -> FsResult<()> {
        self.client.file_move(&clean(src), &clean(dst))?;
        Ok(())
    }

    fn makedir(&self, path: &str, recursive: bool, allow_recreate: bool) -> FsResult<()> {
        let path = clean(path);
        if path == "/" {
            if allow_recreate {
                return Ok(());
            }
            return Err(FsError::DestinationExists { path });
        }

        if recursive {
            let parent = dirname(&path).to_string();
            if !self.isdir(&parent)? {
                self.makedir(&parent, true, true)?;
            }
        }

        match self.client.file_create_folder(&path) {
            Ok(_) => Ok(()),
            Err(FsError::DestinationExists { path }) => {
                if allow_recreate && self.isdir(&path)? {
                    Ok(())
                } else {
                    Err(FsError::DestinationExists { path })
                }
            }
            Err(e) => Err(e),
        }
    }

    fn remove(&self, path: &str) -> FsResult<()> {
        self.client.file_delete(&clean(path))
    }

    fn removedir(&self, path: &str) -> FsResult<()> {
        self.client.file_delete(&clean(path))
    }

    fn getsyspath(&self, path: &str) -> String {
        format_path(&clean(path))
    }

    fn desc(&self, path: &str) -> String {
        format!("{} in Dropbox", path)
    }
}
