use serde::{Deserialize, Serialize};

/// A level in the upstream workspace → space → folder → list hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Workspace,
    Space,
    Folder,
    List,
}

impl HierarchyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Workspace => "workspace",
            HierarchyLevel::Space => "space",
            HierarchyLevel::Folder => "folder",
            HierarchyLevel::List => "list",
        }
    }

    /// The level that contains this one, if any.
    pub fn parent(&self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Workspace => None,
            HierarchyLevel::Space => Some(HierarchyLevel::Workspace),
            HierarchyLevel::Folder => Some(HierarchyLevel::Space),
            HierarchyLevel::List => Some(HierarchyLevel::Folder),
        }
    }
}

impl std::fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
