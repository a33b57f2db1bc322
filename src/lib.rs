//! Dropbox as a filesystem
//!
//! Path-based file operations over the Dropbox REST API, with a metadata
//! cache in front of the remote and spooled transfers for file content.

pub mod cache;
pub mod config;
pub mod fs;
pub mod remote;
pub mod transfer;

pub use cache::CachingClient;
pub use config::{AccessType, CacheConfig, DropboxConfig};
pub use fs::{
    DropboxFs, FileStream, FileSystem, FsError, FsMeta, FsResult, ListDirOptions, OpenMode,
};
pub use remote::{DropboxClient, RemoteApi, RemoteError};
