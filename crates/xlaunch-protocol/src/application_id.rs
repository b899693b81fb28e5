//! Application identifiers assigned by the resource manager.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Identifier of one submitted application, `application_<clusterTimestamp>_<seq>`.
///
/// Opaque to the launcher apart from its textual form, which namespaces the
/// staging area.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApplicationId {
    cluster_timestamp: u64,
    sequence: u32,
}

/// Error returned when a string is not a well-formed application id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid application id: '{0}'")]
pub struct ApplicationIdError(pub String);

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^application_([0-9]{1,20})_([0-9]{1,10})$").expect("static pattern compiles")
    })
}

impl ApplicationId {
    pub fn new(cluster_timestamp: u64, sequence: u32) -> Self {
        Self {
            cluster_timestamp,
            sequence,
        }
    }

    /// Start time of the resource manager that issued this id.
    pub fn cluster_timestamp(&self) -> u64 {
        self.cluster_timestamp
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "application_{}_{:04}", self.cluster_timestamp, self.sequence)
    }
}

impl FromStr for ApplicationId {
    type Err = ApplicationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = id_pattern()
            .captures(s)
            .ok_or_else(|| ApplicationIdError(s.to_string()))?;

        let cluster_timestamp = caps[1]
            .parse()
            .map_err(|_| ApplicationIdError(s.to_string()))?;
        let sequence = caps[2]
            .parse()
            .map_err(|_| ApplicationIdError(s.to_string()))?;

        Ok(Self {
            cluster_timestamp,
            sequence,
        })
    }
}

impl TryFrom<String> for ApplicationId {
    type Error = ApplicationIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ApplicationId> for String {
    fn from(id: ApplicationId) -> Self {
        id.to_string()
    }
}
