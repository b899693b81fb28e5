//! Staged manifest: the local resources handed to the coordinator container.

use std::collections::BTreeMap;

use tracing::warn;
use xlaunch_protocol::ops::{LocalResource, ResourceKind};

use crate::fs::{FsError, RemotePath, SharedFs};

/// One named artifact on the shared store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub location: RemotePath,
    pub kind: ResourceKind,
    pub size: u64,
    pub timestamp: i64,
    /// Unix mode the launcher created the file with, if it created it.
    pub permission: Option<u32>,
}

impl ManifestEntry {
    pub fn to_local_resource(&self) -> LocalResource {
        LocalResource {
            location: self.location.to_string(),
            kind: self.kind,
            size: self.size,
            timestamp: self.timestamp,
        }
    }
}

/// Resource name → staged artifact. Entries are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl StagedManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `location` on the store and register it under `name`.
    pub fn register(
        &mut self,
        fs: &dyn SharedFs,
        name: impl Into<String>,
        location: RemotePath,
        kind: ResourceKind,
        permission: Option<u32>,
    ) -> Result<(), FsError> {
        let name = name.into();
        let status = fs.status(&location)?;
        let entry = ManifestEntry {
            location,
            kind,
            size: status.size,
            timestamp: status.modification_time,
            permission,
        };
        if let Some(previous) = self.entries.insert(name.clone(), entry) {
            warn!(
                "Local resource {} registered twice, {} replaces {}",
                name, self.entries[&name].location, previous.location
            );
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ManifestEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_local_resources(&self) -> BTreeMap<String, LocalResource> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.to_local_resource()))
            .collect()
    }
}
