use crate::scope::{
    collect_direct_scopes, collect_indirect_refs, IndirectRef, ScopeHints, ScopeSet,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use taskdeck_directory::RecordCatalogue;
use taskdeck_gateway::UpstreamGateway;
use taskdeck_protocol::{normalize_task, string_field};
use thiserror::Error;

/// Gate posture for mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAccessMode {
    Open,
    Closed,
    Selective,
}

#[derive(Debug, Clone)]
pub struct WriteAccessConfig {
    pub mode: WriteAccessMode,
    pub allowed_spaces: BTreeSet<String>,
    pub allowed_lists: BTreeSet<String>,
    /// Cap on upstream lookups per check; bulk inputs must not fan out
    /// unboundedly.
    pub max_resolutions: usize,
}

impl Default for WriteAccessConfig {
    fn default() -> Self {
        Self {
            mode: WriteAccessMode::Open,
            allowed_spaces: BTreeSet::new(),
            allowed_lists: BTreeSet::new(),
            max_resolutions: 5,
        }
    }
}

pub type Result<T> = std::result::Result<T, WriteAccessError>;

/// Rejection reasons. Undetermined scope and disallowed scope are distinct
/// because the remediation differs: the former asks the caller for an
/// explicit scope, the latter names the scopes that were refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteAccessError {
    #[error("write access is disabled for this session")]
    Disabled,

    #[error(
        "could not determine which space or list this write targets; supply an explicit spaceId or listId"
    )]
    ScopeUndetermined,

    #[error("write targets scopes outside the allow-list: {}", scopes.join(", "))]
    ScopeNotAllowed { scopes: Vec<String> },
}

/// Resolves an operation's hierarchical scope and accepts or rejects the
/// mutation against the configured allow-list.
pub struct WriteAccessGate {
    config: WriteAccessConfig,
    gateway: Arc<dyn UpstreamGateway>,
    catalogue: Arc<RecordCatalogue>,
}

impl WriteAccessGate {
    pub fn new(
        config: WriteAccessConfig,
        gateway: Arc<dyn UpstreamGateway>,
        catalogue: Arc<RecordCatalogue>,
    ) -> Self {
        Self {
            config,
            gateway,
            catalogue,
        }
    }

    pub fn mode(&self) -> WriteAccessMode {
        self.config.mode
    }

    /// Decide whether a mutation described by `input` may proceed.
    pub async fn ensure_write_allowed(
        &self,
        input: &Value,
        hints: Option<&ScopeHints>,
    ) -> Result<()> {
        match self.config.mode {
            WriteAccessMode::Open => Ok(()),
            WriteAccessMode::Closed => Err(WriteAccessError::Disabled),
            WriteAccessMode::Selective => self.check_selective(input, hints).await,
        }
    }

    async fn check_selective(&self, input: &Value, hints: Option<&ScopeHints>) -> Result<()> {
        let mut scopes = ScopeSet::default();
        if let Some(hints) = hints {
            scopes.absorb_hints(hints);
        }
        collect_direct_scopes(input, &mut scopes);

        let mut budget = self.config.max_resolutions;
        if scopes.is_empty() {
            for reference in collect_indirect_refs(input) {
                if budget == 0 {
                    break;
                }
                budget -= 1;
                self.resolve_reference(&reference, &mut scopes).await;
            }
        }

        if scopes.is_empty() {
            return Err(WriteAccessError::ScopeUndetermined);
        }
        if self.allowed(&scopes) {
            return Ok(());
        }

        // A list signal not on the allow-list may still live in an allowed
        // space; resolve every remaining signal upward before rejecting.
        for list_id in scopes.lists.clone() {
            if budget == 0 {
                break;
            }
            budget -= 1;
            match self.space_of_list(&list_id).await {
                Some(space_id) => {
                    scopes.spaces.insert(space_id);
                }
                None => log::debug!("could not resolve list {list_id} to a space"),
            }
        }
        if self.allowed(&scopes) {
            Ok(())
        } else {
            Err(WriteAccessError::ScopeNotAllowed {
                scopes: scopes.describe(),
            })
        }
    }

    fn allowed(&self, scopes: &ScopeSet) -> bool {
        scopes
            .spaces
            .iter()
            .any(|id| self.config.allowed_spaces.contains(id))
            || scopes
                .lists
                .iter()
                .any(|id| self.config.allowed_lists.contains(id))
    }

    /// Resolve one task/document reference to its containing scopes.
    /// Individual failures are skipped, never fatal to the check.
    async fn resolve_reference(&self, reference: &IndirectRef, scopes: &mut ScopeSet) {
        match reference {
            IndirectRef::Task(task_id) => {
                let gateway = Arc::clone(&self.gateway);
                let fetched = self
                    .catalogue
                    .ensure_task(task_id, || async move { gateway.get_task(task_id).await })
                    .await;
                match fetched {
                    Ok(raw) => {
                        if let Some(task) = normalize_task(&raw) {
                            if let Some(list_id) = task.list_id {
                                scopes.lists.insert(list_id);
                            }
                        }
                        if let Some(space) = raw.get("space") {
                            if let Some(space_id) = string_field(space, &["id"]) {
                                scopes.spaces.insert(space_id);
                            }
                        }
                    }
                    Err(err) => {
                        log::debug!("scope resolution for task {task_id} failed: {err}");
                    }
                }
            }
            IndirectRef::Document(document_id) => {
                match self.gateway.get_document(document_id).await {
                    Ok(raw) => {
                        if let Some(space_id) = string_field(&raw, &["space_id", "spaceId"])
                            .or_else(|| raw.get("space").and_then(|s| string_field(s, &["id"])))
                        {
                            scopes.spaces.insert(space_id);
                        }
                        if let Some(list_id) = string_field(&raw, &["list_id", "listId"])
                            .or_else(|| raw.get("list").and_then(|l| string_field(l, &["id"])))
                        {
                            scopes.lists.insert(list_id);
                        }
                    }
                    Err(err) => {
                        log::debug!("scope resolution for document {document_id} failed: {err}");
                    }
                }
            }
        }
    }

    async fn space_of_list(&self, list_id: &str) -> Option<String> {
        match self.gateway.get_list(list_id).await {
            Ok(raw) => string_field(&raw, &["space_id", "spaceId"])
                .or_else(|| raw.get("space").and_then(|s| string_field(s, &["id"]))),
            Err(err) => {
                log::debug!("list lookup for {list_id} failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use taskdeck_directory::CatalogueTtls;
    use taskdeck_gateway::{GatewayError, Result as GatewayResult};

    #[derive(Default)]
    struct StubGateway {
        tasks: HashMap<String, Value>,
        lists: HashMap<String, Value>,
        documents: HashMap<String, Value>,
        task_calls: AtomicUsize,
        list_calls: AtomicUsize,
    }

    impl StubGateway {
        fn with_task(mut self, id: &str, value: Value) -> Self {
            self.tasks.insert(id.to_string(), value);
            self
        }

        fn with_list(mut self, id: &str, value: Value) -> Self {
            self.lists.insert(id.to_string(), value);
            self
        }

        fn with_document(mut self, id: &str, value: Value) -> Self {
            self.documents.insert(id.to_string(), value);
            self
        }
    }

    #[async_trait]
    impl UpstreamGateway for StubGateway {
        async fn list_workspaces(&self) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn list_spaces(&self, _workspace_id: &str) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn list_folders(&self, _space_id: &str) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn list_space_lists(&self, _space_id: &str) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn list_folder_lists(&self, _folder_id: &str) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn get_list(&self, list_id: &str) -> GatewayResult<Value> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            self.lists
                .get(list_id)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(format!("list {list_id}")))
        }
        async fn get_task(&self, task_id: &str) -> GatewayResult<Value> {
            self.task_calls.fetch_add(1, Ordering::SeqCst);
            self.tasks
                .get(task_id)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))
        }
        async fn list_tasks(
            &self,
            _list_id: &str,
            _params: &Value,
            _page: u32,
        ) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn search_tasks(&self, _workspace_id: &str, _params: &Value) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn list_members(&self, _workspace_id: &str) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn get_document(&self, document_id: &str) -> GatewayResult<Value> {
            self.documents
                .get(document_id)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound(format!("document {document_id}")))
        }
        async fn list_documents(&self, _workspace_id: &str) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
        async fn search_documents(
            &self,
            _workspace_id: &str,
            _params: &Value,
        ) -> GatewayResult<Vec<Value>> {
            Ok(vec![])
        }
    }

    fn selective_gate(gateway: StubGateway, spaces: &[&str], lists: &[&str]) -> WriteAccessGate {
        WriteAccessGate::new(
            WriteAccessConfig {
                mode: WriteAccessMode::Selective,
                allowed_spaces: spaces.iter().map(|s| s.to_string()).collect(),
                allowed_lists: lists.iter().map(|s| s.to_string()).collect(),
                max_resolutions: 5,
            },
            Arc::new(gateway),
            Arc::new(RecordCatalogue::new(CatalogueTtls::default())),
        )
    }

    #[tokio::test]
    async fn open_mode_always_allows() {
        let gate = WriteAccessGate::new(
            WriteAccessConfig::default(),
            Arc::new(StubGateway::default()),
            Arc::new(RecordCatalogue::new(CatalogueTtls::default())),
        );
        gate.ensure_write_allowed(&json!({}), None).await.expect("allowed");
    }

    #[tokio::test]
    async fn closed_mode_always_denies() {
        let gate = WriteAccessGate::new(
            WriteAccessConfig {
                mode: WriteAccessMode::Closed,
                ..WriteAccessConfig::default()
            },
            Arc::new(StubGateway::default()),
            Arc::new(RecordCatalogue::new(CatalogueTtls::default())),
        );
        let err = gate
            .ensure_write_allowed(&json!({"spaceId": "space-1"}), None)
            .await
            .expect_err("denied");
        assert_eq!(err, WriteAccessError::Disabled);
    }

    #[tokio::test]
    async fn selective_allows_and_rejects_direct_space_ids() {
        let gate = selective_gate(StubGateway::default(), &["space-1"], &[]);
        gate.ensure_write_allowed(&json!({"spaceId": "space-1"}), None)
            .await
            .expect("allowed");

        let err = gate
            .ensure_write_allowed(&json!({"spaceId": "space-2"}), None)
            .await
            .expect_err("rejected");
        match err {
            WriteAccessError::ScopeNotAllowed { scopes } => {
                assert_eq!(scopes, vec!["space:space-2"]);
            }
            other => panic!("expected disallowed scope, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn selective_resolves_task_to_allowed_space() {
        let gateway = StubGateway::default()
            .with_task(
                "86dt2abc",
                json!({"id": "86dt2abc", "name": "Ship", "list": {"id": "901"}, "space": {"id": "space-1"}}),
            );
        let gate = selective_gate(gateway, &["space-1"], &[]);
        gate.ensure_write_allowed(&json!({"taskId": "86dt2abc"}), None)
            .await
            .expect("allowed via task resolution");
    }

    #[tokio::test]
    async fn selective_resolves_task_list_then_list_space() {
        // task payload carries only the list; the list lookup supplies the
        // space that is actually on the allow-list
        let gateway = StubGateway::default()
            .with_task("86dt2abc", json!({"id": "86dt2abc", "list": {"id": "901"}}))
            .with_list("901", json!({"id": "901", "space": {"id": "space-1"}}));
        let gate = selective_gate(gateway, &["space-1"], &[]);
        gate.ensure_write_allowed(&json!({"task_id": "86dt2abc"}), None)
            .await
            .expect("allowed via two-step resolution");
    }

    #[tokio::test]
    async fn missing_scope_is_distinct_from_disallowed_scope() {
        let gate = selective_gate(StubGateway::default(), &["space-1"], &[]);
        let err = gate
            .ensure_write_allowed(&json!({"name": "no scope here"}), None)
            .await
            .expect_err("undetermined");
        assert_eq!(err, WriteAccessError::ScopeUndetermined);
    }

    #[tokio::test]
    async fn resolution_failures_are_skipped_not_fatal() {
        // first task id is unknown upstream; the second resolves
        let gateway = StubGateway::default().with_task(
            "86dt2abd",
            json!({"id": "86dt2abd", "list": {"id": "901"}}),
        );
        let gate = selective_gate(gateway, &[], &["901"]);
        gate.ensure_write_allowed(
            &json!({"tasks": [{"taskId": "86dt2zzz"}, {"taskId": "86dt2abd"}]}),
            None,
        )
        .await
        .expect("second reference still resolves");
    }

    #[tokio::test]
    async fn resolution_fan_out_is_capped() {
        let mut gateway = StubGateway::default();
        for i in 0..20 {
            gateway.tasks.insert(
                format!("task-{i}"),
                json!({"id": format!("task-{i}"), "list": {"id": "nope"}}),
            );
        }
        let gate = WriteAccessGate::new(
            WriteAccessConfig {
                mode: WriteAccessMode::Selective,
                allowed_spaces: BTreeSet::from(["space-1".to_string()]),
                allowed_lists: BTreeSet::new(),
                max_resolutions: 3,
            },
            Arc::new(gateway),
            Arc::new(RecordCatalogue::new(CatalogueTtls::default())),
        );
        let entries: Vec<Value> = (0..20)
            .map(|i| json!({"taskId": format!("task-{i}")}))
            .collect();
        let err = gate
            .ensure_write_allowed(&json!({"tasks": entries}), None)
            .await
            .expect_err("rejected");
        assert!(matches!(err, WriteAccessError::ScopeNotAllowed { .. }));
    }

    #[tokio::test]
    async fn document_reference_resolves_to_scope() {
        let gateway = StubGateway::default()
            .with_document("doc-1", json!({"id": "doc-1", "space_id": "space-1"}));
        let gate = selective_gate(gateway, &["space-1"], &[]);
        gate.ensure_write_allowed(&json!({"documentId": "doc-1"}), None)
            .await
            .expect("allowed via document resolution");
    }

    #[tokio::test]
    async fn hints_are_honored_without_input_fields() {
        let gate = selective_gate(StubGateway::default(), &[], &["901"]);
        let hints = ScopeHints {
            space_ids: vec![],
            list_ids: vec!["901".to_string()],
        };
        gate.ensure_write_allowed(&json!({}), Some(&hints))
            .await
            .expect("allowed via hints");
    }
}
