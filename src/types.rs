//! Identity and location types shared by every stage.
//!
//! These are the tokens the surrounding application stores in its own
//! records, so they serialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Storage path of a normalized avatar.
///
/// The handle doubles as the source identity for derived assets. An empty
/// handle means the user never uploaded an avatar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetHandle(String);

impl AssetHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Handle for a profile with no avatar.
    pub fn none() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// The handle's path without its extension, e.g. `uploads/ab12` for
    /// `uploads/ab12.jpg`. Used to group derived assets per source.
    pub fn stem_path(&self) -> String {
        let path = Path::new(&self.0);
        match (path.parent(), path.file_stem()) {
            (Some(parent), Some(stem)) if !parent.as_os_str().is_empty() => {
                format!("{}/{}", parent.to_string_lossy(), stem.to_string_lossy())
            }
            (_, Some(stem)) => stem.to_string_lossy().to_string(),
            _ => self.0.clone(),
        }
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolvable location (URL or path) handed back to the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Location(String);

impl Location {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
