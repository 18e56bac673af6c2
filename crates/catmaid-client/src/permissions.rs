//! Per-project capabilities of the current user
//!
//! Mutations require `can_annotate`, reads require `can_browse`. Checks run
//! before any request is queued.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{ClientError, Result};
use crate::types::ProjectId;

/// A capability granted on a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    #[serde(rename = "can_annotate")]
    Annotate,
    #[serde(rename = "can_browse")]
    Browse,
    #[serde(rename = "can_administer")]
    Administer,
    #[serde(rename = "can_import")]
    Import,
    #[serde(rename = "can_edit_any")]
    EditAny,
    #[serde(rename = "can_view_any")]
    ViewAny,
}

impl Capability {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "can_annotate" => Some(Self::Annotate),
            "can_browse" => Some(Self::Browse),
            "can_administer" => Some(Self::Administer),
            "can_import" => Some(Self::Import),
            "can_edit_any" => Some(Self::EditAny),
            "can_view_any" => Some(Self::ViewAny),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annotate => "can_annotate",
            Self::Browse => "can_browse",
            Self::Administer => "can_administer",
            Self::Import => "can_import",
            Self::EditAny => "can_edit_any",
            Self::ViewAny => "can_view_any",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities by project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    projects: HashMap<ProjectId, HashSet<Capability>>,
}

impl Permissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant every known capability on a project
    pub fn all(project: ProjectId) -> Self {
        [
            Capability::Annotate,
            Capability::Browse,
            Capability::Administer,
            Capability::Import,
            Capability::EditAny,
            Capability::ViewAny,
        ]
        .into_iter()
        .fold(Self::new(), |p, c| p.with_grant(project, c))
    }

    pub fn with_grant(mut self, project: ProjectId, capability: Capability) -> Self {
        self.grant(project, capability);
        self
    }

    pub fn grant(&mut self, project: ProjectId, capability: Capability) {
        self.projects.entry(project).or_default().insert(capability);
    }

    pub fn revoke(&mut self, project: ProjectId, capability: Capability) {
        if let Some(caps) = self.projects.get_mut(&project) {
            caps.remove(&capability);
        }
    }

    pub fn has(&self, project: ProjectId, capability: Capability) -> bool {
        self.projects
            .get(&project)
            .is_some_and(|caps| caps.contains(&capability))
    }

    /// Fail with `PermissionDenied` unless the capability is held
    pub fn require(&self, project: ProjectId, capability: Capability, message: &str) -> Result<()> {
        if self.has(project, capability) {
            Ok(())
        } else {
            Err(ClientError::PermissionDenied {
                project,
                capability,
                message: message.to_string(),
            })
        }
    }

    /// Parse the server's `{"<project_id>": {"can_annotate": true, ...}}` map
    ///
    /// Unknown capability names are ignored.
    pub fn from_server_json(value: &serde_json::Value) -> Result<Self> {
        let raw: HashMap<String, HashMap<String, bool>> = serde_json::from_value(value.clone())?;
        let mut permissions = Self::new();
        for (project, caps) in raw {
            let project: ProjectId = project.parse().map_err(|_| {
                ClientError::InvalidResponse(format!("project id {:?} is not numeric", project))
            })?;
            for (name, granted) in caps {
                match Capability::from_str(&name) {
                    Some(capability) if granted => permissions.grant(project, capability),
                    _ => {}
                }
            }
        }
        Ok(permissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require() {
        let perms = Permissions::new().with_grant(1, Capability::Browse);

        assert!(perms.require(1, Capability::Browse, "browse").is_ok());
        let err = perms.require(1, Capability::Annotate, "annotate").unwrap_err();
        assert!(matches!(
            err,
            ClientError::PermissionDenied {
                project: 1,
                capability: Capability::Annotate,
                ..
            }
        ));
        assert!(perms.require(2, Capability::Browse, "other project").is_err());
    }

    #[test]
    fn test_revoke() {
        let mut perms = Permissions::all(3);
        assert!(perms.has(3, Capability::Annotate));
        perms.revoke(3, Capability::Annotate);
        assert!(!perms.has(3, Capability::Annotate));
        assert!(perms.has(3, Capability::Browse));
    }

    #[test]
    fn test_from_server_json() {
        let json = serde_json::json!({
            "1": {"can_annotate": true, "can_browse": true, "can_fly": true},
            "2": {"can_annotate": false, "can_browse": true}
        });
        let perms = Permissions::from_server_json(&json).unwrap();

        assert!(perms.has(1, Capability::Annotate));
        assert!(!perms.has(2, Capability::Annotate));
        assert!(perms.has(2, Capability::Browse));
    }

    #[test]
    fn test_from_server_json_rejects_bad_project() {
        let json = serde_json::json!({"abc": {"can_browse": true}});
        assert!(Permissions::from_server_json(&json).is_err());
    }
}
