//! Input/output path mappings
//!
//! Each job input or output is a remote location bound to a local alias
//! (the directory name the job sees inside its container). Entries sharing
//! an alias accumulate in the order given.

use std::collections::BTreeMap;

use tracing::info;

use crate::error::{LaunchError, LaunchResult};
use crate::fs::{RemotePath, SharedFs};

/// Alias → remote locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMapping {
    entries: BTreeMap<String, Vec<String>>,
}

impl PathMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `remote` under `alias`.
    pub fn add(&mut self, alias: impl Into<String>, remote: impl Into<String>) {
        self.entries.entry(alias.into()).or_default().push(remote.into());
    }

    /// Comma-joined remotes for `alias`.
    pub fn get(&self, alias: &str) -> Option<String> {
        self.entries.get(alias).map(|remotes| remotes.join(","))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// One `remotes#alias` row per alias, rows joined with `|`.
    ///
    /// `/a,/b#train|/c#test`
    pub fn to_input_env(&self) -> String {
        self.entries
            .iter()
            .map(|(alias, remotes)| format!("{}#{}", remotes.join(","), alias))
            .collect::<Vec<_>>()
            .join("|")
    }

    /// One `remote#alias` row per destination, rows joined with `|`.
    ///
    /// `/out/a#model|/out/b#model`
    pub fn to_output_env(&self) -> String {
        self.entries
            .iter()
            .flat_map(|(alias, remotes)| remotes.iter().map(move |r| format!("{}#{}", r, alias)))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Split `remote[#alias]`. A missing or empty alias yields `None`.
pub fn split_entry(entry: &str) -> LaunchResult<(&str, Option<&str>)> {
    match entry.split_once('#') {
        None => Ok((entry.trim(), None)),
        Some((_, alias)) if alias.contains('#') => Err(LaunchError::InvalidArgument(format!(
            "path entry '{}' has more than one '#'",
            entry
        ))),
        Some((remote, alias)) => {
            let alias = alias.trim();
            Ok((remote.trim(), if alias.is_empty() { None } else { Some(alias) }))
        }
    }
}

fn split_remotes(remote: &str) -> impl Iterator<Item = &str> {
    remote.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Builds [`PathMapping`]s, checking each location against the shared store.
pub struct PathMapper<'a> {
    fs: &'a dyn SharedFs,
    input_alias: String,
    output_alias: String,
}

impl<'a> PathMapper<'a> {
    pub fn new(
        fs: &'a dyn SharedFs,
        input_alias: impl Into<String>,
        output_alias: impl Into<String>,
    ) -> Self {
        Self {
            fs,
            input_alias: input_alias.into(),
            output_alias: output_alias.into(),
        }
    }

    /// Every source must exist.
    pub fn map_inputs(&self, entries: &[String]) -> LaunchResult<PathMapping> {
        let mut mapping = PathMapping::new();
        for entry in entries {
            let (remote, alias) = split_entry(entry)?;
            let alias = alias.unwrap_or(self.input_alias.as_str());

            let mut sources = Vec::new();
            for source in split_remotes(remote) {
                if !self.fs.exists(&RemotePath::parse(source))? {
                    return Err(LaunchError::PathNotFound {
                        what: "Input",
                        path: source.to_string(),
                    });
                }
                sources.push(source);
            }
            if sources.is_empty() {
                return Err(LaunchError::InvalidArgument(format!(
                    "input entry '{}' names no remote path",
                    entry
                )));
            }

            let joined = sources.join(",");
            info!("Local input path: {} and remote input path: {}", alias, joined);
            mapping.add(alias, joined);
        }
        Ok(mapping)
    }

    /// No destination may exist yet.
    pub fn map_outputs(&self, entries: &[String]) -> LaunchResult<PathMapping> {
        let mut mapping = PathMapping::new();
        for entry in entries {
            let (remote, alias) = split_entry(entry)?;
            let alias = match alias {
                Some(a) => a,
                None => {
                    info!(
                        "Remote output path {} has no local alias, using {}",
                        remote, self.output_alias
                    );
                    self.output_alias.as_str()
                }
            };

            let mut any = false;
            for dest in split_remotes(remote) {
                if self.fs.exists(&RemotePath::parse(dest))? {
                    return Err(LaunchError::DuplicateOutputPath(dest.to_string()));
                }
                info!("Local output path: {} and remote output path: {}", alias, dest);
                mapping.add(alias, dest);
                any = true;
            }
            if !any {
                return Err(LaunchError::InvalidArgument(format!(
                    "output entry '{}' names no remote path",
                    entry
                )));
            }
        }
        Ok(mapping)
    }
}
