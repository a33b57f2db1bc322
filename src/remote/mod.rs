//! Remote storage API
//!
//! The narrow interface the metadata cache consumes, plus the HTTP
//! implementation for Dropbox.

pub mod client;
pub mod errors;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;

use std::io::{Cursor, Read};

pub use client::DropboxClient;
pub use errors::RemoteError;
pub use types::*;

/// Options for a metadata fetch
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataRequest<'a> {
    /// Report deleted entries instead of hiding them
    pub include_deleted: bool,
    /// Include the folder listing in `contents`
    pub list: bool,
    /// Listing version tag already held by the caller
    pub hash: Option<&'a str>,
}

/// A byte source handed to `upload`; owned so it can outlive the caller's borrow
pub struct UploadBody {
    reader: Box<dyn Read + Send + Sync>,
    len: u64,
}

impl UploadBody {
    pub fn new(reader: Box<dyn Read + Send + Sync>, len: u64) -> Self {
        Self { reader, len }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        let len = data.len() as u64;
        Self::new(Box::new(Cursor::new(data)), len)
    }

    /// Declared body length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for UploadBody {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

/// A streamed file body returned by `download`
pub struct Download {
    pub body: Box<dyn Read + Send>,
    pub content_length: u64,
}

/// Blocking remote storage primitives
///
/// Paths are absolute and normalized. Implementations classify failures
/// into `RemoteError::NotFound`, `RemoteError::NotModified` and
/// status-carrying errors; they never retry.
pub trait RemoteApi: Send + Sync {
    /// Fetch metadata for a path, optionally with its folder listing
    fn fetch_metadata(&self, path: &str, request: MetadataRequest<'_>)
        -> Result<Metadata, RemoteError>;

    /// Create a folder, returning its metadata
    fn create_directory(&self, path: &str) -> Result<Metadata, RemoteError>;

    /// Copy a file or folder, returning the destination's metadata
    fn copy(&self, src: &str, dst: &str) -> Result<Metadata, RemoteError>;

    /// Move a file or folder, returning the destination's metadata
    fn move_entry(&self, src: &str, dst: &str) -> Result<Metadata, RemoteError>;

    /// Delete a file or folder
    fn delete(&self, path: &str) -> Result<Metadata, RemoteError>;

    /// Store the body at `path`, returning the stored file's metadata
    fn upload(&self, path: &str, body: UploadBody, overwrite: bool)
        -> Result<Metadata, RemoteError>;

    /// Open a streamed download of a file's content
    fn download(&self, path: &str) -> Result<Download, RemoteError>;
}
