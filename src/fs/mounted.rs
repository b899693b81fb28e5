//! Shared store backed by a local mount point.
//!
//! Remote `scheme://authority/p` maps to `<root>/p` when scheme and
//! authority match the configured default. Bare paths are qualified first.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use super::{FileStatus, FsError, RemotePath, SharedFs};

#[derive(Debug, Clone)]
pub struct MountedFs {
    root: PathBuf,
    default_fs: String,
    default: RemotePath,
}

impl MountedFs {
    pub fn new(root: impl Into<PathBuf>, default_fs: impl Into<String>) -> Self {
        let default_fs = default_fs.into();
        let default = RemotePath::parse(&default_fs);
        Self {
            root: root.into(),
            default_fs,
            default,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local file backing a remote path.
    pub fn local_path(&self, path: &RemotePath) -> Result<PathBuf, FsError> {
        let qualified = self.qualify(path);
        if qualified.scheme() != self.default.scheme()
            || qualified.authority() != self.default.authority()
        {
            return Err(FsError::ForeignAuthority {
                path: qualified.to_string(),
                expected: self.default_fs.clone(),
            });
        }

        let relative = Path::new(qualified.path().trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(FsError::OutsideRoot(qualified.to_string()));
        }

        Ok(self.root.join(relative))
    }

    fn copy_dir(src: &Path, dest: &Path) -> Result<(), FsError> {
        for entry in WalkDir::new(src).follow_links(true) {
            let entry = entry.map_err(|e| FsError::io(src.display(), e.into()))?;
            let rel = entry
                .path()
                .strip_prefix(src)
                .map_err(|_| FsError::OutsideRoot(entry.path().display().to_string()))?;
            let target = dest.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| FsError::io(target.display(), e))?;
            } else {
                fs::copy(entry.path(), &target).map_err(|e| FsError::io(target.display(), e))?;
            }
        }
        Ok(())
    }
}

impl SharedFs for MountedFs {
    fn default_authority(&self) -> &str {
        &self.default_fs
    }

    fn exists(&self, path: &RemotePath) -> Result<bool, FsError> {
        let local = self.local_path(path)?;
        Ok(local.exists())
    }

    fn status(&self, path: &RemotePath) -> Result<FileStatus, FsError> {
        let local = self.local_path(path)?;
        let meta = match fs::metadata(&local) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FsError::NotFound(path.to_string()))
            }
            Err(e) => return Err(FsError::io(path, e)),
        };
        let modification_time = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .unwrap_or(0);

        Ok(FileStatus {
            size: if meta.is_dir() { 0 } else { meta.len() },
            modification_time,
            is_dir: meta.is_dir(),
        })
    }

    fn copy_from_local(&self, src: &Path, dest: &RemotePath) -> Result<(), FsError> {
        if !src.exists() {
            return Err(FsError::NotFound(src.display().to_string()));
        }
        let target = self.local_path(dest)?;
        debug!(src = %src.display(), dest = %target.display(), "copying into mounted store");

        if src.is_dir() {
            return Self::copy_dir(src, &target);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::io(dest, e))?;
        }
        fs::copy(src, &target).map_err(|e| FsError::io(dest, e))?;
        Ok(())
    }

    fn create_with_permissions(
        &self,
        dest: &RemotePath,
        contents: &[u8],
        permission: u32,
    ) -> Result<(), FsError> {
        let target = self.local_path(dest)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::io(dest, e))?;
        }
        fs::write(&target, contents).map_err(|e| FsError::io(dest, e))?;
        set_mode(&target, permission).map_err(|e| FsError::io(dest, e))?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
