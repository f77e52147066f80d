use crate::config::SessionConfig;
use serde_json::Value;
use std::sync::Arc;
use taskdeck_bulk::BulkEngine;
use taskdeck_directory::{
    EnsureOptions, HierarchyDirectory, ListPage, ListPageKey, RecordCatalogue, SearchKey,
};
use taskdeck_gate::{WriteAccessError, WriteAccessGate};
use taskdeck_gateway::{CapabilityRegistry, GatewayError, UpstreamGateway};
use taskdeck_protocol::{normalize_text, string_field, CacheMetadata, HierarchyLevel};
use taskdeck_resolver::{MemberResolver, ResolveError, ResolvedMember, ResolvedTask};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures surfaced to tool handlers, spanning the gateway, reference
/// resolution, and the write gate.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    WriteAccess(#[from] WriteAccessError),
}

/// One session's private set of directories, caches, and engines. Built
/// once per logical session and discarded with it; nothing here is shared
/// across sessions.
pub struct SessionServices {
    config: SessionConfig,
    gateway: Arc<dyn UpstreamGateway>,
    pub hierarchy: HierarchyDirectory,
    pub catalogue: Arc<RecordCatalogue>,
    pub capabilities: CapabilityRegistry,
    pub bulk: BulkEngine,
    pub gate: WriteAccessGate,
    members: tokio::sync::Mutex<Option<Arc<MemberResolver>>>,
}

impl SessionServices {
    pub fn new(config: SessionConfig, gateway: Arc<dyn UpstreamGateway>) -> Self {
        let catalogue = Arc::new(RecordCatalogue::new(config.catalogue_ttls));
        let gate = WriteAccessGate::new(
            config.write_access.clone(),
            Arc::clone(&gateway),
            Arc::clone(&catalogue),
        );
        Self {
            hierarchy: HierarchyDirectory::new(config.hierarchy_ttl),
            catalogue,
            capabilities: CapabilityRegistry::new(),
            bulk: BulkEngine::new(config.bulk_concurrency),
            gate,
            members: tokio::sync::Mutex::new(None),
            config,
            gateway,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<dyn UpstreamGateway> {
        &self.gateway
    }

    // ---- hierarchy listings -------------------------------------------

    pub async fn workspaces(
        &self,
        options: EnsureOptions,
    ) -> std::result::Result<(Vec<Value>, CacheMetadata), GatewayError> {
        self.hierarchy
            .ensure(
                HierarchyLevel::Workspace,
                None,
                || async { self.gateway.list_workspaces().await },
                options,
            )
            .await
    }

    pub async fn spaces(
        &self,
        workspace_id: &str,
        options: EnsureOptions,
    ) -> std::result::Result<(Vec<Value>, CacheMetadata), GatewayError> {
        self.hierarchy
            .ensure(
                HierarchyLevel::Space,
                Some(workspace_id),
                || async { self.gateway.list_spaces(workspace_id).await },
                options,
            )
            .await
    }

    pub async fn folders(
        &self,
        space_id: &str,
        options: EnsureOptions,
    ) -> std::result::Result<(Vec<Value>, CacheMetadata), GatewayError> {
        self.hierarchy
            .ensure(
                HierarchyLevel::Folder,
                Some(space_id),
                || async { self.gateway.list_folders(space_id).await },
                options,
            )
            .await
    }

    /// Folderless lists living directly under a space.
    pub async fn space_lists(
        &self,
        space_id: &str,
        options: EnsureOptions,
    ) -> std::result::Result<(Vec<Value>, CacheMetadata), GatewayError> {
        self.hierarchy
            .ensure(
                HierarchyLevel::List,
                Some(space_id),
                || async { self.gateway.list_space_lists(space_id).await },
                options,
            )
            .await
    }

    pub async fn folder_lists(
        &self,
        folder_id: &str,
        options: EnsureOptions,
    ) -> std::result::Result<(Vec<Value>, CacheMetadata), GatewayError> {
        self.hierarchy
            .ensure(
                HierarchyLevel::List,
                Some(folder_id),
                || async { self.gateway.list_folder_lists(folder_id).await },
                options,
            )
            .await
    }

    // ---- records ------------------------------------------------------

    pub async fn task(&self, task_id: &str) -> std::result::Result<Value, GatewayError> {
        self.catalogue
            .ensure_task(task_id, || async {
                self.gateway.get_task(task_id).await
            })
            .await
    }

    pub async fn list_page(
        &self,
        list_id: &str,
        filters: &Value,
        page: u32,
    ) -> std::result::Result<(Arc<ListPage>, CacheMetadata), GatewayError> {
        self.catalogue
            .ensure_list_page(ListPageKey::new(list_id, filters, page), || async {
                self.gateway.list_tasks(list_id, filters, page).await
            })
            .await
    }

    pub async fn search_tasks(
        &self,
        workspace_id: &str,
        params: &Value,
    ) -> std::result::Result<(Vec<Value>, CacheMetadata), GatewayError> {
        self.catalogue
            .ensure_search(SearchKey::new(workspace_id, params), || async {
                self.gateway.search_tasks(workspace_id, params).await
            })
            .await
    }

    // ---- reference resolution -----------------------------------------

    /// Map a free-text task reference onto a task within one list, reusing
    /// the cached page and its lazily-built index across calls.
    pub async fn resolve_task_in_list(
        &self,
        list_id: &str,
        reference: &str,
    ) -> Result<ResolvedTask> {
        let (page, _) = self.list_page(list_id, &Value::Null, 0).await?;
        Ok(page.task_index().resolve(reference)?)
    }

    /// The session-scoped member resolver, built from the member listing
    /// on first use.
    pub async fn member_resolver(
        &self,
        workspace_id: &str,
    ) -> std::result::Result<Arc<MemberResolver>, GatewayError> {
        let mut guard = self.members.lock().await;
        if let Some(resolver) = guard.as_ref() {
            return Ok(Arc::clone(resolver));
        }
        let raw = self.gateway.list_members(workspace_id).await?;
        log::debug!("indexed {} members for {workspace_id}", raw.len());
        let resolver = Arc::new(MemberResolver::from_raw(&raw, self.config.fuzzy_limit));
        *guard = Some(Arc::clone(&resolver));
        Ok(resolver)
    }

    /// Rebuild the member index from a fresh listing.
    pub async fn refresh_members(
        &self,
        workspace_id: &str,
    ) -> std::result::Result<Arc<MemberResolver>, GatewayError> {
        let raw = self.gateway.list_members(workspace_id).await?;
        let resolver = Arc::new(MemberResolver::from_raw(&raw, self.config.fuzzy_limit));
        *self.members.lock().await = Some(Arc::clone(&resolver));
        Ok(resolver)
    }

    pub async fn resolve_member(
        &self,
        workspace_id: &str,
        reference: &str,
    ) -> Result<ResolvedMember> {
        let resolver = self.member_resolver(workspace_id).await?;
        Ok(resolver.resolve(reference)?)
    }

    // ---- documents ----------------------------------------------------

    /// Search documents via the dedicated endpoint when it answers; some
    /// upstream plans lack it, in which case the workspace document
    /// listing is scanned instead.
    pub async fn search_documents(
        &self,
        workspace_id: &str,
        params: &Value,
    ) -> std::result::Result<Vec<Value>, GatewayError> {
        let key = format!("document_search:{workspace_id}");
        self.capabilities
            .dispatch(
                &key,
                || async { self.gateway.search_documents(workspace_id, params).await },
                || async {
                    let documents = self.gateway.list_documents(workspace_id).await?;
                    Ok(filter_documents(documents, params))
                },
            )
            .await
    }

    // ---- write gate ---------------------------------------------------

    pub async fn ensure_write_allowed(&self, input: &Value) -> Result<()> {
        Ok(self.gate.ensure_write_allowed(input, None).await?)
    }
}

fn filter_documents(documents: Vec<Value>, params: &Value) -> Vec<Value> {
    let Some(query) = string_field(params, &["query", "search", "q"]) else {
        return documents;
    };
    let needle = normalize_text(&query);
    documents
        .into_iter()
        .filter(|doc| {
            string_field(doc, &["name", "title"])
                .map(|name| normalize_text(&name).contains(&needle))
                .unwrap_or(false)
        })
        .collect()
}
