//! TOML-based group membership file.
//!
//! The file format:
//!
//! ```toml
//! [groups]
//! "User 1" = ["moderator", "automoderated"]
//! "User 3" = ["automoderated"]
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::RoleSource;
use crate::errors::PermissionError;

/// Wrapper around the TOML groups file structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GroupsFileData {
    /// Actor name -> group names.
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

/// Group memberships loaded from a TOML file.
#[derive(Debug, Clone, Default)]
pub struct GroupsFile {
    groups: HashMap<String, HashSet<String>>,
}

impl GroupsFile {
    /// Load the groups file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PermissionError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading groups file");

        if !path.exists() {
            return Err(PermissionError::GroupsFileError {
                path: path.display().to_string(),
                detail: "file not found".into(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse groups-file contents.
    pub fn parse(contents: &str) -> Result<Self, PermissionError> {
        let data: GroupsFileData =
            toml::from_str(contents).map_err(|e| PermissionError::ParseError(e.to_string()))?;
        debug!(count = data.groups.len(), "loaded group memberships");
        Ok(Self {
            groups: data
                .groups
                .into_iter()
                .map(|(actor, groups)| (actor, groups.into_iter().collect()))
                .collect(),
        })
    }

    /// Save memberships back to disk in TOML format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PermissionError> {
        let path = path.as_ref();
        info!(path = %path.display(), "saving groups file");

        let data = GroupsFileData {
            groups: self
                .groups
                .iter()
                .map(|(actor, groups)| {
                    let mut sorted: Vec<String> = groups.iter().cloned().collect();
                    sorted.sort();
                    (actor.clone(), sorted)
                })
                .collect(),
        };
        let toml_str =
            toml::to_string_pretty(&data).map_err(|e| PermissionError::ParseError(e.to_string()))?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    /// Add `actor` to `group`.
    pub fn add(&mut self, actor: &str, group: &str) {
        self.groups
            .entry(actor.to_string())
            .or_default()
            .insert(group.to_string());
    }
}

impl RoleSource for GroupsFile {
    fn groups_of(&self, actor: &str) -> HashSet<String> {
        self.groups.get(actor).cloned().unwrap_or_default()
    }
}
