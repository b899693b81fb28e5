//! Distributed-cache specifiers
//!
//! A specifier is `remotePath` or `remotePath#alias`; several may be joined
//! with commas. The alias is the name the entry gets in the container's
//! working directory and defaults to the last path segment.

use tracing::info;
use xlaunch_protocol::ops::ResourceKind;

use crate::error::{LaunchError, LaunchResult};
use crate::fs::{RemotePath, SharedFs};

/// One resolved cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Location qualified against the store's default authority.
    pub remote: RemotePath,
    pub alias: String,
    pub kind: ResourceKind,
}

/// Cache entries partitioned by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedCache {
    pub files: Vec<CacheEntry>,
    pub archives: Vec<CacheEntry>,
}

impl ResolvedCache {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.archives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.files.iter().chain(self.archives.iter())
    }
}

/// Parse one specifier into its remote part and alias, without touching
/// the store.
pub fn parse_spec(spec: &str) -> LaunchResult<(RemotePath, String)> {
    let spec = spec.trim();
    if spec.contains('#') {
        let parts: Vec<&str> = spec.split('#').filter(|p| !p.is_empty()).collect();
        if parts.len() != 2 {
            return Err(LaunchError::CacheSpecMalformed(spec.to_string()));
        }
        return Ok((RemotePath::parse(parts[0]), parts[1].to_string()));
    }

    let remote = RemotePath::parse(spec);
    let alias = remote.file_name().to_string();
    if alias.is_empty() {
        return Err(LaunchError::CacheSpecMalformed(spec.to_string()));
    }
    Ok((remote, alias))
}

/// Split comma-joined specifier lists into single specifiers.
pub fn split_specs(specs: &[String]) -> impl Iterator<Item = &str> {
    specs
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub struct CacheResolver<'a> {
    fs: &'a dyn SharedFs,
}

impl<'a> CacheResolver<'a> {
    pub fn new(fs: &'a dyn SharedFs) -> Self {
        Self { fs }
    }

    /// Resolve specifiers of one kind. Every remote must exist.
    pub fn resolve(&self, specs: &[String], kind: ResourceKind) -> LaunchResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for spec in split_specs(specs) {
            let (remote, alias) = parse_spec(spec)?;
            if !self.fs.exists(&remote)? {
                return Err(LaunchError::PathNotFound {
                    what: match kind {
                        ResourceKind::File => "Cache file",
                        ResourceKind::Archive => "Cache archive",
                    },
                    path: remote.to_string(),
                });
            }
            let remote = self.fs.qualify(&remote);
            info!("Cache {:?} remote path is {} and alias name is {}", kind, remote, alias);
            entries.push(CacheEntry {
                remote,
                alias,
                kind,
            });
        }
        Ok(entries)
    }

    pub fn resolve_all(&self, files: &[String], archives: &[String]) -> LaunchResult<ResolvedCache> {
        Ok(ResolvedCache {
            files: self.resolve(files, ResourceKind::File)?,
            archives: self.resolve(archives, ResourceKind::Archive)?,
        })
    }
}
