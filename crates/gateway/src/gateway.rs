use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Capability set exposed by the upstream work-management API.
///
/// Every method returns raw upstream-shaped records; callers assume nothing
/// about them beyond "has an identifier". Transport, authentication, and
/// retry policy live behind the implementation.
#[async_trait]
pub trait UpstreamGateway: Send + Sync {
    async fn list_workspaces(&self) -> Result<Vec<Value>>;
    async fn list_spaces(&self, workspace_id: &str) -> Result<Vec<Value>>;
    async fn list_folders(&self, space_id: &str) -> Result<Vec<Value>>;
    async fn list_space_lists(&self, space_id: &str) -> Result<Vec<Value>>;
    async fn list_folder_lists(&self, folder_id: &str) -> Result<Vec<Value>>;
    async fn get_list(&self, list_id: &str) -> Result<Value>;

    async fn get_task(&self, task_id: &str) -> Result<Value>;
    /// One page of a list's tasks; `params` carries upstream filter fields.
    async fn list_tasks(&self, list_id: &str, params: &Value, page: u32) -> Result<Vec<Value>>;
    async fn search_tasks(&self, workspace_id: &str, params: &Value) -> Result<Vec<Value>>;

    async fn list_members(&self, workspace_id: &str) -> Result<Vec<Value>>;

    async fn get_document(&self, document_id: &str) -> Result<Value>;
    async fn list_documents(&self, workspace_id: &str) -> Result<Vec<Value>>;
    /// Dedicated document search. Optional upstream endpoint; callers gate
    /// it behind a [`crate::CapabilityRegistry`] probe.
    async fn search_documents(&self, workspace_id: &str, params: &Value) -> Result<Vec<Value>>;
}
