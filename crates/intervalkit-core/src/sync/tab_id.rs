// Tab identity for cross-tab sync
// Format: "tab-<uuid>"

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TAB_ID_PREFIX: &str = "tab-";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TabIdError {
    #[error("Invalid tab ID format: {0}")]
    InvalidFormat(String),
}

/// Identifies one viewer of the shared store. Writes carry it as their
/// origin so a tab can recognize its own changes on the feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TabId(String);

impl TabId {
    pub fn new() -> Self {
        Self(format!("{}{}", TAB_ID_PREFIX, Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TabId {
    type Err = TabIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix(TAB_ID_PREFIX) {
            Some(rest) if Uuid::parse_str(rest).is_ok() => Ok(Self(s.to_string())),
            _ => Err(TabIdError::InvalidFormat(s.to_string())),
        }
    }
}

impl TryFrom<String> for TabId {
    type Error = TabIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TabId> for String {
    fn from(id: TabId) -> Self {
        id.0
    }
}
