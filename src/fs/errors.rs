//! Filesystem Error Types
//!
//! The error taxonomy seen by filesystem callers. Remote statuses are
//! resolved into these kinds by the caching client, never later.

/// Filesystem error types
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("Resource not found: {path}")]
    ResourceNotFound { path: String },

    #[error("Resource is not of the required kind: {path}")]
    ResourceInvalid { path: String },

    #[error("Parent directory is missing: {path}")]
    ParentDirectoryMissing { path: String },

    #[error("Destination exists: {path}")]
    DestinationExists { path: String },

    #[error("Directory is not empty: {path}")]
    DirectoryNotEmpty { path: String },

    #[error("Remote connection error in {op} for {path} (status {status:?})")]
    RemoteConnection {
        op: &'static str,
        path: String,
        status: Option<u16>,
    },

    #[error("Invalid wildcard '{pattern}': {source}")]
    InvalidWildcard {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for filesystem operations
pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    pub fn not_found(path: &str) -> Self {
        FsError::ResourceNotFound {
            path: path.to_string(),
        }
    }

    /// Map the error to an appropriate libc errno
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::ResourceNotFound { .. } => libc::ENOENT,
            FsError::ResourceInvalid { .. } => libc::ENOTDIR,
            FsError::ParentDirectoryMissing { .. } => libc::ENOENT,
            FsError::DestinationExists { .. } => libc::EEXIST,
            FsError::DirectoryNotEmpty { .. } => libc::ENOTEMPTY,
            FsError::RemoteConnection { .. } => libc::EIO,
            FsError::InvalidWildcard { .. } => libc::EINVAL,
            FsError::Io(_) => libc::EIO,
        }
    }
}
