//! Filesystem interface
//!
//! The path-based operations callers use, the error taxonomy and the
//! Dropbox-backed implementation.

pub mod dropboxfs;
pub mod errors;
pub mod path;

use std::io::{Read, Seek, Write};

use chrono::NaiveDateTime;

pub use dropboxfs::DropboxFs;
pub use errors::{FsError, FsResult};

/// An open file
///
/// Readers serve their content locally once opened. Writers upload on
/// `close`, or on drop if never closed.
pub trait FileStream: Read + Write + Seek + Send {
    /// Size of the content in bytes
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finish the stream, surfacing any upload failure
    fn close(self: Box<Self>) -> FsResult<()>;
}

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl OpenMode {
    /// Parse a mode string such as "rb" or "w"
    ///
    /// Any mode containing 'r' reads; everything else writes.
    pub fn parse(mode: &str) -> Self {
        if mode.contains('r') {
            OpenMode::Read
        } else {
            OpenMode::Write
        }
    }
}

/// Normalized description of one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    pub modified_time: Option<NaiveDateTime>,
}

/// Which members `listdir` keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryFilter {
    #[default]
    All,
    DirsOnly,
    FilesOnly,
}

/// How `listdir` renders member paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PathStyle {
    /// Bare member names
    #[default]
    Name,
    /// Listed path joined with the name, without the leading slash
    Full,
    /// Absolute member paths
    Absolute,
}

/// Options for `listdir`
#[derive(Debug, Clone, Default)]
pub struct ListDirOptions {
    /// fnmatch-style pattern matched against member names
    pub wildcard: Option<String>,
    pub filter: EntryFilter,
    pub style: PathStyle,
}

/// Capabilities a filesystem declares about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsMeta {
    pub thread_safe: bool,
    /// Paths do not map to a local directory tree
    pub virtual_paths: bool,
    pub read_only: bool,
    pub unicode_paths: bool,
    pub case_insensitive_paths: bool,
    pub network: bool,
    pub atomic_setcontents: bool,
    pub atomic_makedir: bool,
    pub atomic_rename: bool,
    pub mime_type: &'static str,
}

/// A single capability value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaValue {
    Bool(bool),
    Str(&'static str),
}

impl FsMeta {
    /// Look up a capability by its dotted name, e.g. "atomic.rename"
    pub fn get(&self, name: &str) -> Option<MetaValue> {
        let value = match name {
            "thread_safe" => MetaValue::Bool(self.thread_safe),
            "virtual" => MetaValue::Bool(self.virtual_paths),
            "read_only" => MetaValue::Bool(self.read_only),
            "unicode_paths" => MetaValue::Bool(self.unicode_paths),
            "case_insensitive_paths" => MetaValue::Bool(self.case_insensitive_paths),
            "network" => MetaValue::Bool(self.network),
            "atomic.setcontents" => MetaValue::Bool(self.atomic_setcontents),
            "atomic.makedir" => MetaValue::Bool(self.atomic_makedir),
            "atomic.rename" => MetaValue::Bool(self.atomic_rename),
            "mime_type" => MetaValue::Str(self.mime_type),
            _ => return None,
        };
        Some(value)
    }
}

/// Path-based file operations
///
/// Paths are normalized and made absolute by implementations.
pub trait FileSystem: Send + Sync {
    fn meta(&self) -> FsMeta;

    /// One capability by name; `None` if the name is unknown
    fn getmeta(&self, name: &str) -> Option<MetaValue> {
        self.meta().get(name)
    }

    fn open(&self, path: &str, mode: OpenMode) -> FsResult<Box<dyn FileStream>>;

    /// Whole content of a file
    fn getcontents(&self, path: &str) -> FsResult<Vec<u8>> {
        let mut file = self.open(path, OpenMode::Read)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        file.close()?;
        Ok(data)
    }

    /// Replace the content of a file
    fn setcontents(&self, path: &str, data: &[u8]) -> FsResult<()>;

    fn getinfo(&self, path: &str) -> FsResult<ResourceInfo>;

    fn listdir(&self, path: &str, options: &ListDirOptions) -> FsResult<Vec<String>>;

    fn isdir(&self, path: &str) -> FsResult<bool> {
        match self.getinfo(path) {
            Ok(info) => Ok(info.is_dir),
            Err(FsError::ResourceNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn isfile(&self, path: &str) -> FsResult<bool> {
        match self.getinfo(path) {
            Ok(info) => Ok(info.is_file),
            Err(FsError::ResourceNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, path: &str) -> FsResult<bool> {
        match self.getinfo(path) {
            Ok(_) => Ok(true),
            Err(FsError::ResourceNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn copy(&self, src: &str, dst: &str) -> FsResult<()>;

    fn copydir(&self, src: &str, dst: &str) -> FsResult<()>;

    /// Move a file (`move` is reserved)
    fn move_file(&self, src: &str, dst: &str) -> FsResult<()>;

    fn movedir(&self, src: &str, dst: &str) -> FsResult<()>;

    fn rename(&self, src: &str, dst: &str) -> FsResult<()>;

    fn makedir(&self, path: &str, recursive: bool, allow_recreate: bool) -> FsResult<()>;

    fn remove(&self, path: &str) -> FsResult<()>;

    fn removedir(&self, path: &str) -> FsResult<()>;

    /// Path as the backing system names it
    fn getsyspath(&self, path: &str) -> String;

    /// Human readable description of a path
    fn desc(&self, path: &str) -> String;
}
