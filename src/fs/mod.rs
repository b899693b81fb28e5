//! Shared filesystem access
//!
//! The launcher only needs a handful of operations from the shared store:
//! existence checks, uploads from the local disk, writing a small file with
//! explicit permissions, and a status lookup for local-resource
//! registration. [`SharedFs`] captures that surface; [`MountedFs`] realises
//! it over a locally mounted view of the store.

mod mounted;
mod path;

pub use mounted::MountedFs;
pub use path::RemotePath;

use std::io;
use std::path::Path;

/// Size and modification time of a remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStatus {
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub modification_time: i64,
    pub is_dir: bool,
}

/// Shared filesystem errors
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Path {path} is not on this filesystem ({expected})")]
    ForeignAuthority { path: String, expected: String },

    #[error("Path escapes the filesystem root: {0}")]
    OutsideRoot(String),
}

impl FsError {
    pub(crate) fn io(path: impl std::fmt::Display, source: io::Error) -> Self {
        FsError::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Operations the launcher performs against the shared store.
pub trait SharedFs: Send + Sync {
    /// Default authority, e.g. `hdfs://namenode:8020`.
    fn default_authority(&self) -> &str;

    fn exists(&self, path: &RemotePath) -> Result<bool, FsError>;

    fn status(&self, path: &RemotePath) -> Result<FileStatus, FsError>;

    /// Upload a local file or directory, overwriting the destination.
    fn copy_from_local(&self, src: &Path, dest: &RemotePath) -> Result<(), FsError>;

    /// Create (or truncate) `dest` with `contents` and the given Unix mode.
    fn create_with_permissions(
        &self,
        dest: &RemotePath,
        contents: &[u8],
        permission: u32,
    ) -> Result<(), FsError>;

    /// Qualify a path against this store's default authority.
    fn qualify(&self, path: &RemotePath) -> RemotePath {
        path.qualify(self.default_authority())
    }
}
