use crate::services::SessionServices;
use taskdeck_protocol::HierarchyLevel;

/// Post-mutation invalidation hooks. Call the most specific hook for what
/// the mutation touched, strictly after the upstream call succeeded;
/// over-invalidation is safe, under-invalidation is a correctness bug.
impl SessionServices {
    /// Task created, updated, deleted, or its tags/time entries changed.
    pub fn after_task_write(&self, task_id: &str, list_id: Option<&str>) {
        self.catalogue.invalidate_task(task_id);
        if let Some(list_id) = list_id {
            self.catalogue.invalidate_list(list_id);
        }
        self.catalogue.invalidate_search();
    }

    /// Task moved between lists: both the source and target pages are
    /// stale.
    pub fn after_task_move(&self, task_id: &str, source_list: Option<&str>, target_list: &str) {
        self.catalogue.invalidate_task(task_id);
        if let Some(source_list) = source_list {
            self.catalogue.invalidate_list(source_list);
        }
        self.catalogue.invalidate_list(target_list);
        self.catalogue.invalidate_search();
    }

    /// List created, renamed, or deleted under a space or folder.
    pub fn after_list_write(&self, parent_id: &str, list_id: Option<&str>) {
        self.hierarchy.invalidate(HierarchyLevel::List, Some(parent_id));
        if let Some(list_id) = list_id {
            self.catalogue.invalidate_list(list_id);
        }
    }

    /// Folder created, renamed, or deleted: the space's folder listing and
    /// the folder's own list listing are both stale.
    pub fn after_folder_write(&self, space_id: &str, folder_id: Option<&str>) {
        self.hierarchy.invalidate(HierarchyLevel::Folder, Some(space_id));
        if let Some(folder_id) = folder_id {
            self.hierarchy.invalidate(HierarchyLevel::List, Some(folder_id));
        }
    }

    /// Space created, renamed, or deleted under a workspace.
    pub fn after_space_write(&self, workspace_id: &str, space_id: Option<&str>) {
        self.hierarchy.invalidate(HierarchyLevel::Space, Some(workspace_id));
        if let Some(space_id) = space_id {
            self.hierarchy.invalidate(HierarchyLevel::Folder, Some(space_id));
            self.hierarchy.invalidate(HierarchyLevel::List, Some(space_id));
        }
    }
}
