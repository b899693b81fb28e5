//! Remote path handling
//!
//! Paths on the shared store look like `scheme://authority/some/path`.
//! Bare paths (`/data/train`) carry neither scheme nor authority and are
//! qualified against the store's default authority before use.

use std::fmt;

/// A parsed location on the shared store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath {
    scheme: Option<String>,
    authority: Option<String>,
    path: String,
}

impl RemotePath {
    /// Parse a location string. Never fails: anything without `://` is a
    /// bare path.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Some((scheme, rest)) = s.split_once("://") {
            if !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
                let (authority, path) = match rest.find('/') {
                    Some(idx) => (&rest[..idx], &rest[idx..]),
                    None => (rest, "/"),
                };
                return Self {
                    scheme: Some(scheme.to_string()),
                    authority: if authority.is_empty() {
                        None
                    } else {
                        Some(authority.to_string())
                    },
                    path: normalize(path),
                };
            }
        }

        Self {
            scheme: None,
            authority: None,
            path: normalize(s),
        }
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Path component, always starting with `/` for qualified paths.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether both scheme and authority are present.
    pub fn is_qualified(&self) -> bool {
        self.scheme.is_some() && self.authority.is_some()
    }

    /// Whether this names something already on a remote store, i.e. it has
    /// a scheme other than `file`.
    pub fn is_remote(&self) -> bool {
        matches!(self.scheme.as_deref(), Some(s) if s != "file")
    }

    /// Fill in missing scheme or authority from `default_fs`
    /// (e.g. `hdfs://namenode:8020`). Relative paths are anchored at `/`.
    pub fn qualify(&self, default_fs: &str) -> RemotePath {
        if self.is_qualified() {
            return self.clone();
        }
        let default = RemotePath::parse(default_fs);
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        RemotePath {
            scheme: self.scheme.clone().or(default.scheme),
            authority: self.authority.clone().or(default.authority),
            path,
        }
    }

    /// Last path segment; empty for the root.
    pub fn file_name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }

    /// Append one child segment.
    pub fn join(&self, child: &str) -> RemotePath {
        let child = child.trim_matches('/');
        let path = if child.is_empty() {
            self.path.clone()
        } else if self.path.ends_with('/') {
            format!("{}{}", self.path, child)
        } else {
            format!("{}/{}", self.path, child)
        };
        RemotePath {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path,
        }
    }
}

fn normalize(path: &str) -> String {
    if path.len() > 1 {
        path.trim_end_matches('/').to_string()
    } else {
        path.to_string()
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.scheme, &self.authority) {
            (Some(scheme), Some(authority)) => write!(f, "{}://{}{}", scheme, authority, self.path),
            (Some(scheme), None) => write!(f, "{}://{}", scheme, self.path),
            _ => write!(f, "{}", self.path),
        }
    }
}
